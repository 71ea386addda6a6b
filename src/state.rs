//! Previous-run state snapshot.
//!
//! After a successful apply, the natural keys of every resource the run
//! managed are written to disk. The next run reads the snapshot once at
//! start and uses it to call out remote resources that used to be managed
//! but have since been dropped from the configuration — those are the
//! entries a `delete_unmanaged` flag would remove.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Managed-resource snapshot across all instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppliedState {
    /// Per-instance snapshots, keyed by instance name
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceState>,

    /// When the snapshot was last written
    pub last_updated: Option<DateTime<Utc>>,
}

/// Managed-resource snapshot for one instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceState {
    /// Natural keys managed by the previous run, keyed by section name
    #[serde(default)]
    pub managed: BTreeMap<String, BTreeSet<String>>,
}

impl AppliedState {
    /// State directory (`~/.local/state/arrsync`).
    pub fn state_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".local").join("state").join("arrsync"))
    }

    fn state_file() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("state.json"))
    }

    /// Load the snapshot from the default location, or default when the
    /// file does not exist (including when no home directory resolves).
    pub fn load() -> Result<Self> {
        match Self::state_file() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the snapshot from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;
        log::debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Save the snapshot to the default location. A missing home
    /// directory downgrades to a warning; losing the snapshot only costs
    /// the previously-managed annotations on the next run.
    pub fn save(&mut self) -> Result<()> {
        match Self::state_file() {
            Some(path) => self.save_to(&path),
            None => {
                log::warn!("No home directory, skipping state snapshot");
                Ok(())
            }
        }
    }

    /// Save the snapshot to an explicit path.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Some(Utc::now());
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Keys managed for a section by the previous run.
    pub fn previously_managed(&self, instance: &str, section: &str) -> BTreeSet<String> {
        self.instances
            .get(instance)
            .and_then(|i| i.managed.get(section))
            .cloned()
            .unwrap_or_default()
    }

    /// Replace one instance's snapshot.
    pub fn record_instance(&mut self, instance: &str, managed: BTreeMap<String, BTreeSet<String>>) {
        self.instances
            .insert(instance.to_string(), InstanceState { managed });
    }
}
