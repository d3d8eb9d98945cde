//! Frequency bookkeeping.
//!
//! A module with frequency `once` or `once-per-instance` leaves a semaphore
//! behind after it runs; the runner consults the store before running it
//! again. `always` modules never touch the store.
//!
//! # File Layout
//!
//! ```text
//! <cloud_dir>/sem/config_runcmd.once                       once
//! <cloud_dir>/instances/<iid>/sem/config_runcmd            once-per-instance
//! ```

use crate::error::{Result, StagerunError};
use crate::paths::Paths;
use crate::types::Frequency;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Persistent record of which modules already ran
pub trait FrequencyStore {
    /// Whether `name` has a semaphore for `frequency`
    fn has_run(&self, name: &str, frequency: Frequency) -> Result<bool>;

    /// Record that `name` ran
    fn mark_ran(&mut self, name: &str, frequency: Frequency) -> Result<()>;

    /// Remove the record; returns whether one existed
    fn clear(&mut self, name: &str, frequency: Frequency) -> Result<bool>;
}

fn canonical_semaphore_name(name: &str) -> String {
    name.replace(['-', '.'], "_")
}

/// Semaphores stored as files under the cloud dir
#[derive(Debug, Clone)]
pub struct FileSemaphores {
    paths: Paths,
}

impl FileSemaphores {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Semaphore file for `name` at `frequency`
    pub fn semaphore_path(&self, name: &str, frequency: Frequency) -> PathBuf {
        let name = canonical_semaphore_name(name);
        let file = match frequency {
            Frequency::OncePerInstance => name,
            other => format!("{}.{}", name, other),
        };
        self.paths.semaphore_dir(frequency).join(file)
    }
}

impl FrequencyStore for FileSemaphores {
    fn has_run(&self, name: &str, frequency: Frequency) -> Result<bool> {
        if !frequency.is_gated() {
            return Ok(false);
        }
        Ok(self.semaphore_path(name, frequency).exists())
    }

    fn mark_ran(&mut self, name: &str, frequency: Frequency) -> Result<()> {
        if !frequency.is_gated() {
            return Ok(());
        }
        let path = self.semaphore_path(name, frequency);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| StagerunError::semaphore(name, e))?;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        fs::write(&path, format!("{}: {}\n", std::process::id(), now))
            .map_err(|e| StagerunError::semaphore(name, e))?;
        debug!("Created semaphore {}", path.display());
        Ok(())
    }

    fn clear(&mut self, name: &str, frequency: Frequency) -> Result<bool> {
        if !frequency.is_gated() {
            return Ok(false);
        }
        let path = self.semaphore_path(name, frequency);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StagerunError::semaphore(name, e)),
        }
    }
}

/// In-memory store; nothing survives the process
#[derive(Debug, Clone, Default)]
pub struct MemorySemaphores {
    ran: HashSet<(String, Frequency)>,
}

impl MemorySemaphores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrequencyStore for MemorySemaphores {
    fn has_run(&self, name: &str, frequency: Frequency) -> Result<bool> {
        Ok(frequency.is_gated() && self.ran.contains(&(canonical_semaphore_name(name), frequency)))
    }

    fn mark_ran(&mut self, name: &str, frequency: Frequency) -> Result<()> {
        if frequency.is_gated() {
            self.ran.insert((canonical_semaphore_name(name), frequency));
        }
        Ok(())
    }

    fn clear(&mut self, name: &str, frequency: Frequency) -> Result<bool> {
        Ok(self.ran.remove(&(canonical_semaphore_name(name), frequency)))
    }
}
