//! Live configuration reload.
//!
//! The file's modification time is polled; when it changes the file is
//! re-read and the state configuration groups are replaced. A file that fails
//! to load leaves the running configuration in place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{info, warn};
use relay_core::VehicleState;

use crate::config::{ConfigError, RelayConfig};

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Watch `path`, treating its current contents as already applied.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file again if it changed since the last poll.
    ///
    /// Returns `None` when unchanged or currently missing.
    pub fn poll(&mut self) -> Option<Result<RelayConfig, ConfigError>> {
        let current = modified(&self.path)?;
        if self.last_modified == Some(current) {
            return None;
        }
        self.last_modified = Some(current);
        Some(RelayConfig::load(&self.path))
    }

    /// Poll and apply a changed file to `state`.
    ///
    /// Returns whether a new configuration was applied.
    pub fn reload_into(&mut self, state: &VehicleState) -> bool {
        match self.poll() {
            Some(Ok(config)) => {
                state.apply_config(&config.state_config());
                info!("configuration reloaded from {}", self.path.display());
                true
            }
            Some(Err(e)) => {
                warn!("configuration not reloaded: {e}");
                false
            }
            None => false,
        }
    }
}
