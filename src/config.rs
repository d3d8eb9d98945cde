//! Effective configuration document and its loaders.
//!
//! The orchestrator only sees `ConfigLoader`. `FileConfigLoader` reads JSON
//! documents in order and deep merges them; `StaticConfig` wraps a document
//! that is already in memory.

use crate::error::{Result, StagerunError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Merged configuration: top-level keys to arbitrary nested values
pub type CloudConfig = Map<String, Value>;

/// Produces the effective configuration document
pub trait ConfigLoader {
    /// Load and merge the configuration. Called at most once per orchestrator
    /// unless its cache is invalidated.
    fn load_effective_config(&mut self) -> Result<CloudConfig>;
}

/// Loader over an in-memory document
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    cfg: CloudConfig,
}

impl StaticConfig {
    pub fn new(cfg: CloudConfig) -> Self {
        Self { cfg }
    }

    /// Build from a JSON value; anything but an object is a config error
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(cfg) => Ok(Self { cfg }),
            other => Err(StagerunError::config(format!(
                "configuration must be a JSON object, got {}",
                value_kind(&other)
            ))),
        }
    }
}

impl ConfigLoader for StaticConfig {
    fn load_effective_config(&mut self) -> Result<CloudConfig> {
        Ok(self.cfg.clone())
    }
}

/// Loader that reads and deep merges JSON config files.
///
/// Files are applied in order: maps merge recursively, any other value from a
/// later file replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct FileConfigLoader {
    files: Vec<PathBuf>,
}

impl FileConfigLoader {
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    fn read_document(path: &Path) -> Result<CloudConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            StagerunError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            StagerunError::config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StagerunError::config(format!(
                "{} must contain a JSON object, got {}",
                path.display(),
                value_kind(&other)
            ))),
        }
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load_effective_config(&mut self) -> Result<CloudConfig> {
        let mut merged = CloudConfig::new();
        for path in &self.files {
            debug!("Merging configuration from {}", path.display());
            let doc = Self::read_document(path)?;
            merge_into(&mut merged, doc);
        }
        debug!(
            "Effective configuration has {} top-level keys from {} files",
            merged.len(),
            self.files.len()
        );
        Ok(merged)
    }
}

/// Deep merge `overlay` into `base`
pub fn merge_into(base: &mut CloudConfig, overlay: CloudConfig) {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
