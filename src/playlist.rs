use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::error::PreferenceError;
use crate::preferences::PreferenceStore;

/// Snapshot of the configured videos, read fresh for every pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoPlaylist {
    items: Vec<String>,
}

impl VideoPlaylist {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn load<P>(prefs: &mut P) -> Result<Self, PreferenceError>
    where
        P: PreferenceStore + ?Sized,
    {
        prefs.read_video_list().map(Self::new)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Picks one entry uniformly from the whole list. Repeats of the previous
    /// pick are allowed.
    pub fn choose<R>(&self, rng: &mut R) -> Option<(usize, &str)>
    where
        R: Rng,
    {
        if self.items.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.items.len());
        Some((index, self.items[index].as_str()))
    }
}

/// Seeded RNG for a session, or an OS-seeded one when no seed is configured.
pub fn selection_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Runs `iterations` picks against a fixed playlist without touching any player.
pub fn simulate_picks(playlist: &VideoPlaylist, iterations: usize, seed: Option<u64>) -> Vec<usize> {
    let mut rng = selection_rng(seed);
    let mut plan = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        match playlist.choose(&mut rng) {
            Some((index, _)) => plan.push(index),
            None => break,
        }
    }
    plan
}
