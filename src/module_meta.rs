//! Module Metadata Contracts
//!
//! Every module declares a `ModuleMeta` describing when it applies and how
//! often it may run. The orchestrator never looks inside a module beyond this
//! metadata and the `Module::run` entry point.
//!
//! # Metadata Format
//!
//! Metadata serializes to JSON for `stagerun list --json` style output:
//! ```json
//! {
//!   "name": "runcmd",
//!   "id": "cc_runcmd",
//!   "title": "Run arbitrary commands",
//!   "description": "Write the runcmd list to a per-instance script",
//!   "distros": ["all"],
//!   "examples": ["runcmd: [ls -l /]"],
//!   "frequency": "once-per-instance",
//!   "activate_by_schema_keys": ["runcmd"]
//! }
//! ```

use crate::config::CloudConfig;
use crate::error::{Result, StagerunError};
use crate::paths::Paths;
use crate::types::{Distros, Frequency};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Static description of a module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleMeta {
    /// Canonical module name (unique within a registry)
    pub name: String,

    /// Fully-qualified module id
    pub id: String,

    /// One-line title
    pub title: String,

    /// Longer description
    #[serde(default)]
    pub description: String,

    /// Platforms the module is verified on
    #[serde(default)]
    pub distros: Distros,

    /// Example configuration snippets
    #[serde(default)]
    pub examples: Vec<String>,

    /// Default run cadence
    pub frequency: Frequency,

    /// Top-level config keys that make this module applicable.
    /// `None` and an empty list both mean "always applicable".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activate_by_schema_keys: Option<Vec<String>>,
}

impl ModuleMeta {
    /// Create a new metadata builder
    pub fn builder(name: impl Into<String>, title: impl Into<String>) -> MetaBuilder {
        MetaBuilder::new(name, title)
    }

    /// Activation keys, with a missing list treated as empty
    pub fn activation_keys(&self) -> &[String] {
        self.activate_by_schema_keys.as_deref().unwrap_or(&[])
    }

    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StagerunError::module_load("module name cannot be empty"));
        }
        if self.id.trim().is_empty() {
            return Err(StagerunError::module_load(format!(
                "module '{}' has an empty id",
                self.name
            )));
        }
        if let Distros::Only(names) = &self.distros {
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err(StagerunError::module_load(format!(
                    "module '{}' lists an empty distro name",
                    self.name
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for key in self.activation_keys() {
            if !seen.insert(key) {
                return Err(StagerunError::module_load(format!(
                    "module '{}' repeats activation key '{}'",
                    self.name, key
                )));
            }
        }

        Ok(())
    }
}

/// Builder for creating ModuleMeta instances
#[derive(Debug, Clone)]
pub struct MetaBuilder {
    name: String,
    id: Option<String>,
    title: String,
    description: String,
    distros: Distros,
    examples: Vec<String>,
    frequency: Frequency,
    activate_by_schema_keys: Option<Vec<String>>,
}

impl MetaBuilder {
    /// Create a new builder; the id defaults to `cc_<name>`
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            title: title.into(),
            description: String::new(),
            distros: Distros::All,
            examples: Vec::new(),
            frequency: Frequency::OncePerInstance,
            activate_by_schema_keys: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn distros(mut self, distros: Distros) -> Self {
        self.distros = distros;
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Gate the module on the presence of any of these top-level keys
    pub fn activate_by_schema_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activate_by_schema_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Build the metadata
    pub fn build(self) -> Result<ModuleMeta> {
        let id = self.id.unwrap_or_else(|| format!("cc_{}", self.name));
        let meta = ModuleMeta {
            name: self.name,
            id,
            title: self.title,
            description: self.description,
            distros: self.distros,
            examples: self.examples,
            frequency: self.frequency,
            activate_by_schema_keys: self.activate_by_schema_keys,
        };
        meta.validate_structure()?;
        Ok(meta)
    }
}

/// Everything a module sees while it runs
#[derive(Debug, Clone, Copy)]
pub struct ModuleContext<'a> {
    /// Resolved run-time name
    pub name: &'a str,
    /// Effective configuration document
    pub cfg: &'a CloudConfig,
    /// Cloud dir layout for the current instance
    pub paths: &'a Paths,
    /// Root under which modules write host files
    pub target_root: &'a Path,
}

/// A runnable module.
///
/// One implementation per concrete module; the registry hands them out as
/// `Arc<dyn Module>`.
pub trait Module: Send + Sync {
    /// Static metadata
    fn meta(&self) -> &ModuleMeta;

    /// Run entry point. `args` are the extra arguments from the module list
    /// entry, in order.
    fn run(&self, ctx: &ModuleContext<'_>, args: &[Value]) -> anyhow::Result<()>;
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Module({})", self.meta().id)
    }
}
