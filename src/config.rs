use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

/// Key and wheel sensitivity for volume control.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlOptions {
    /// Volume change for one press of an up/down key.
    pub volume_key_step: f64,
    /// Wheel delta that corresponds to a full volume swing (120 units per notch).
    pub wheel_delta_per_volume: f64,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            volume_key_step: 0.1,
            wheel_delta_per_volume: 1000.0,
        }
    }
}

/// External mpv player settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlayerOptions {
    pub binary: PathBuf,
    /// Extra arguments appended after the built-in ones.
    pub extra_args: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub ipc_connect_timeout: Duration,
    /// Failed picks in a row before playback gives up.
    pub max_consecutive_failures: u32,
    /// Render inside the screensaver window when a native window id is available.
    pub embed: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("mpv"),
            extra_args: Vec::new(),
            ipc_connect_timeout: Duration::from_secs(5),
            max_consecutive_failures: 3,
            embed: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// YAML file holding the video list and the persisted volume.
    pub preferences_path: PathBuf,
    /// Overlay font size used while running as a preview.
    pub preview_font_size: f32,
    /// Optional deterministic seed for video selection.
    pub playlist_seed: Option<u64>,
    pub controls: ControlOptions,
    pub player: PlayerOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        let step = self.controls.volume_key_step;
        ensure!(
            step.is_finite() && step > 0.0 && step <= 1.0,
            "controls.volume-key-step must be within (0, 1]"
        );
        let wheel = self.controls.wheel_delta_per_volume;
        ensure!(
            wheel.is_finite() && wheel > 0.0,
            "controls.wheel-delta-per-volume must be positive"
        );
        ensure!(
            self.preview_font_size.is_finite() && self.preview_font_size > 0.0,
            "preview-font-size must be positive"
        );
        ensure!(
            !self.player.binary.as_os_str().is_empty(),
            "player.binary must not be empty"
        );
        ensure!(
            !self.player.ipc_connect_timeout.is_zero(),
            "player.ipc-connect-timeout must be greater than zero"
        );
        ensure!(
            self.player.max_consecutive_failures > 0,
            "player.max-consecutive-failures must be greater than zero"
        );
        ensure!(
            !self.preferences_path.as_os_str().is_empty(),
            "preferences-path must not be empty"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            preferences_path: PathBuf::from("preferences.yaml"),
            preview_font_size: 12.0,
            playlist_seed: None,
            controls: ControlOptions::default(),
            player: PlayerOptions::default(),
        }
    }
}
