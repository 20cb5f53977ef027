use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PreferenceError;

/// Volume used when nothing has been persisted yet.
pub const DEFAULT_VOLUME: f64 = 0.5;

/// Persisted user preferences: the configured videos and the last volume.
///
/// Reads are whole-value and never cached by callers, so edits made while a
/// session runs are picked up on the next read.
pub trait PreferenceStore {
    fn read_video_list(&mut self) -> Result<Vec<String>, PreferenceError>;
    fn read_volume(&mut self) -> Result<f64, PreferenceError>;
    fn write_volume(&mut self, volume: f64) -> Result<(), PreferenceError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PreferencesDocument {
    #[serde(default)]
    video_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<f64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

/// Preference store backed by a single YAML file:
///
/// ```yaml
/// video-paths:
///   - /home/me/videos/aquarium.mp4
///   - https://example.com/loop.webm
/// volume: 0.4
/// ```
#[derive(Debug, Clone)]
pub struct YamlPreferenceStore {
    path: PathBuf,
}

impl YamlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<PreferencesDocument, PreferenceError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "preferences file missing; using defaults");
                return Ok(PreferencesDocument::default());
            }
            Err(source) => {
                return Err(PreferenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(PreferencesDocument::default());
        }
        serde_yaml::from_str(&text).map_err(|source| PreferenceError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, doc: &PreferencesDocument) -> Result<(), PreferenceError> {
        let yaml = serde_yaml::to_string(doc)?;
        let write_err = |source| PreferenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let tmp = temp_sibling(&self.path);
        fs::write(&tmp, yaml).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

impl PreferenceStore for YamlPreferenceStore {
    fn read_video_list(&mut self) -> Result<Vec<String>, PreferenceError> {
        let doc = self.load()?;
        Ok(doc
            .video_paths
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect())
    }

    fn read_volume(&mut self) -> Result<f64, PreferenceError> {
        Ok(self.load()?.volume.unwrap_or(DEFAULT_VOLUME))
    }

    fn write_volume(&mut self, volume: f64) -> Result<(), PreferenceError> {
        let mut doc = self.load()?;
        doc.volume = Some(volume);
        self.store(&doc)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
