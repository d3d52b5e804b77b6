use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::clock::SESSION_DURATION_SECS;
use crate::detection::{DETECTION_INTERVAL_MS, DETECTION_THRESHOLD};
use crate::labels::UnknownLabels;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub session_secs: u32,
    pub detection_interval_ms: u64,
    pub detection_threshold: f32,
    pub cycle_list: bool,
    pub unknown_labels: UnknownLabels,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_secs: SESSION_DURATION_SECS,
            detection_interval_ms: DETECTION_INTERVAL_MS,
            detection_threshold: DETECTION_THRESHOLD,
            cycle_list: false,
            unknown_labels: UnknownLabels::default(),
        }
    }
}

impl Config {
    /// Clamps values a hand-edited file could get wrong
    pub fn sanitized(mut self) -> Self {
        self.session_secs = self.session_secs.max(1);
        self.detection_interval_ms = self.detection_interval_ms.max(1);
        self.detection_threshold = if self.detection_threshold.is_nan() {
            DETECTION_THRESHOLD
        } else {
            self.detection_threshold.clamp(0.0, 1.0)
        };
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg.sanitized();
            }
            log::warn!("ignoring unreadable config at {}", self.path.display());
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
