//! Error handling module for stagerun
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Module run entry points return `anyhow::Result` and are caught by the
//! runner; everything the orchestrator can fail on is a `StagerunError`.

use thiserror::Error;

/// Main error type for stagerun
#[derive(Error, Debug)]
pub enum StagerunError {
    /// Configuration errors (loading, merging, shape of the document)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A section name the resolver does not know about
    #[error("Unknown module section: {section}")]
    UnknownSection { section: String },

    /// A module list entry that is neither a name, a list nor a map
    #[error("Invalid module entry in '{section}': {reason}")]
    InvalidModuleEntry { section: String, reason: String },

    /// Module lookup or registration errors
    #[error("Module load error: {0}")]
    ModuleLoad(String),

    /// Frequency bookkeeping errors
    #[error("Semaphore error for '{name}': {reason}")]
    Semaphore { name: String, reason: String },
}

/// Result type alias for stagerun operations
pub type Result<T> = std::result::Result<T, StagerunError>;

impl StagerunError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an unknown section error
    pub fn unknown_section(section: impl Into<String>) -> Self {
        Self::UnknownSection {
            section: section.into(),
        }
    }

    /// Create an invalid module entry error
    pub fn invalid_entry(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidModuleEntry {
            section: section.into(),
            reason: reason.into(),
        }
    }

    /// Create a module load error
    pub fn module_load(msg: impl Into<String>) -> Self {
        Self::ModuleLoad(msg.into())
    }

    /// Create a semaphore error
    pub fn semaphore(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Semaphore {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
