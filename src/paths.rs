//! Cloud dir layout.
//!
//! ```text
//! <cloud_dir>/
//!     sem/                         once semaphores
//!     instances/<instance_id>/
//!         sem/                     once-per-instance semaphores
//!         scripts/                 generated per-instance scripts
//! ```

use crate::error::{Result, StagerunError};
use crate::types::Frequency;
use std::path::{Component, Path, PathBuf};

/// Default cloud dir on a provisioned host
pub const DEFAULT_CLOUD_DIR: &str = "/var/lib/cloud";

/// Instance id used when no datasource provides one
pub const DEFAULT_INSTANCE_ID: &str = "iid-datasource-none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    cloud_dir: PathBuf,
    instance_id: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(DEFAULT_CLOUD_DIR, DEFAULT_INSTANCE_ID)
    }
}

impl Paths {
    pub fn new(cloud_dir: impl Into<PathBuf>, instance_id: impl Into<String>) -> Self {
        Self {
            cloud_dir: cloud_dir.into(),
            instance_id: instance_id.into(),
        }
    }

    /// Like `new`, but rejects an instance id that is not a single plain
    /// path component, so per-instance state stays under `<cloud_dir>/instances`
    pub fn checked(cloud_dir: impl Into<PathBuf>, instance_id: impl Into<String>) -> Result<Self> {
        let instance_id = instance_id.into();
        validate_instance_id(&instance_id)?;
        Ok(Self::new(cloud_dir, instance_id))
    }

    pub fn cloud_dir(&self) -> &Path {
        &self.cloud_dir
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Per-instance data dir
    pub fn instance_dir(&self) -> PathBuf {
        self.cloud_dir.join("instances").join(&self.instance_id)
    }

    /// Directory holding semaphores for `frequency`
    pub fn semaphore_dir(&self, frequency: Frequency) -> PathBuf {
        match frequency {
            Frequency::OncePerInstance => self.instance_dir().join("sem"),
            Frequency::Once | Frequency::Always => self.cloud_dir.join("sem"),
        }
    }

    /// Per-instance generated scripts
    pub fn scripts_dir(&self) -> PathBuf {
        self.instance_dir().join("scripts")
    }
}

/// An instance id must name exactly one directory entry
pub fn validate_instance_id(instance_id: &str) -> Result<()> {
    let mut components = Path::new(instance_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == instance_id => Ok(()),
        _ => Err(StagerunError::config(format!(
            "invalid instance id '{}': must be a single path component",
            instance_id
        ))),
    }
}
