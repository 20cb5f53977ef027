//! In-memory collaborators for driving a `Session` without a window system,
//! a player process or a preferences file.
#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use video_screensaver::error::PreferenceError;
use video_screensaver::events::DisplayBounds;
use video_screensaver::preferences::{DEFAULT_VOLUME, PreferenceStore};
use video_screensaver::session::{HostWindow, MediaEngine};

#[derive(Debug, Default)]
struct PreferencesState {
    videos: Vec<String>,
    volume: Option<f64>,
    writes: Vec<f64>,
    fail_reads: bool,
    fail_writes: bool,
}

fn unavailable() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "preferences unavailable")
}

/// Shared handle: clones observe the same state, so a test can keep one while
/// the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    state: Rc<RefCell<PreferencesState>>,
}

impl MemoryPreferences {
    pub fn new(videos: &[&str], volume: f64) -> Self {
        let prefs = Self::default();
        prefs.set_videos(videos);
        prefs.state.borrow_mut().volume = Some(volume);
        prefs
    }

    pub fn set_videos(&self, videos: &[&str]) {
        self.state.borrow_mut().videos = videos.iter().map(|v| v.to_string()).collect();
    }

    pub fn stored_volume(&self) -> Option<f64> {
        self.state.borrow().volume
    }

    /// Successfully persisted volumes, in order.
    pub fn volume_writes(&self) -> Vec<f64> {
        self.state.borrow().writes.clone()
    }

    /// Makes every read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    /// Makes every write fail until cleared; the stored volume stays untouched.
    pub fn fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    fn path() -> PathBuf {
        PathBuf::from("memory://preferences")
    }
}

impl PreferenceStore for MemoryPreferences {
    fn read_video_list(&mut self) -> Result<Vec<String>, PreferenceError> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(PreferenceError::Read {
                path: Self::path(),
                source: unavailable(),
            });
        }
        Ok(state.videos.clone())
    }

    fn read_volume(&mut self) -> Result<f64, PreferenceError> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(PreferenceError::Read {
                path: Self::path(),
                source: unavailable(),
            });
        }
        Ok(state.volume.unwrap_or(DEFAULT_VOLUME))
    }

    fn write_volume(&mut self, volume: f64) -> Result<(), PreferenceError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(PreferenceError::Write {
                path: Self::path(),
                source: unavailable(),
            });
        }
        state.volume = Some(volume);
        state.writes.push(volume);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play(String),
    SetVolume(f64),
    Resize(u32, u32),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    calls: Rc<RefCell<Vec<EngineCall>>>,
}

impl RecordingEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.borrow().clone()
    }

    pub fn played(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Play(uri) => Some(uri.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MediaEngine for RecordingEngine {
    fn play(&mut self, uri: &str) {
        self.calls.borrow_mut().push(EngineCall::Play(uri.to_string()));
    }

    fn set_volume(&mut self, volume: f64) {
        self.calls.borrow_mut().push(EngineCall::SetVolume(volume));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.calls.borrow_mut().push(EngineCall::Resize(width, height));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowCall {
    Place(DisplayBounds),
    Maximize,
    Overlay { text: String, font_size: Option<f32> },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingWindow {
    calls: Rc<RefCell<Vec<WindowCall>>>,
}

impl RecordingWindow {
    pub fn calls(&self) -> Vec<WindowCall> {
        self.calls.borrow().clone()
    }

    pub fn overlays(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                WindowCall::Overlay { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl HostWindow for RecordingWindow {
    fn place(&mut self, bounds: DisplayBounds) {
        self.calls.borrow_mut().push(WindowCall::Place(bounds));
    }

    fn maximize(&mut self) {
        self.calls.borrow_mut().push(WindowCall::Maximize);
    }

    fn show_overlay(&mut self, text: &str, font_size: Option<f32>) {
        self.calls.borrow_mut().push(WindowCall::Overlay {
            text: text.to_string(),
            font_size,
        });
    }
}
