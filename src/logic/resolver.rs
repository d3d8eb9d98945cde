//! Module List Resolver
//!
//! Translates a section's module list from the effective configuration into
//! concrete `ModuleDetails`, in the order the configuration lists them.
//!
//! # Entry Forms
//!
//! | Entry                                   | Resolved To |
//! |-----------------------------------------|-------------|
//! | `"runcmd"`                              | default frequency, no args |
//! | `["runcmd", "always", "a", 1]`          | frequency override, args `["a", 1]` |
//! | `["runcmd", null, "a"]`                 | default frequency, args `["a"]` |
//! | `{"name": "runcmd", "frequency": "once", "args": [..]}` | same, as a map |
//!
//! # Design
//!
//! - **Order preserving**: no sorting, no deduplication
//! - **Lenient on names**: unknown modules are logged and skipped
//! - **Strict on shape**: an entry of any other type is an error

use crate::config::CloudConfig;
use crate::error::{Result, StagerunError};
use crate::module_meta::Module;
use crate::registry::{ModuleRegistry, canonical_module_name};
use crate::types::{Frequency, Stage};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Module Details
// ============================================================================

/// A module resolved for one run: what to call, under which name, how often,
/// and with which arguments.
#[derive(Clone)]
pub struct ModuleDetails {
    module: Arc<dyn Module>,
    name: String,
    frequency: Frequency,
    run_args: Vec<Value>,
}

impl ModuleDetails {
    /// Create details; the name must not be empty
    pub fn new(
        module: Arc<dyn Module>,
        name: impl Into<String>,
        frequency: Frequency,
        run_args: Vec<Value>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StagerunError::module_load(format!(
                "resolved name for {} cannot be empty",
                module.meta().id
            )));
        }
        Ok(Self {
            module,
            name,
            frequency,
            run_args,
        })
    }

    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn run_args(&self) -> &[Value] {
        &self.run_args
    }

    /// Split into `(module, name, frequency, run_args)`
    pub fn into_parts(self) -> (Arc<dyn Module>, String, Frequency, Vec<Value>) {
        (self.module, self.name, self.frequency, self.run_args)
    }
}

impl fmt::Debug for ModuleDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDetails")
            .field("module", &self.module.meta().id)
            .field("name", &self.name)
            .field("frequency", &self.frequency)
            .field("run_args", &self.run_args)
            .finish()
    }
}

// ============================================================================
// Resolver Contract
// ============================================================================

/// Supplies the ordered candidate modules for a section
pub trait ModuleResolver {
    /// Resolve every module listed for `section`. The returned order is
    /// authoritative.
    fn resolve(&self, section: &str, cfg: &CloudConfig) -> Result<Vec<ModuleDetails>>;

    /// Resolve a single module by name, outside of any section
    fn resolve_module(
        &self,
        name: &str,
        _frequency: Option<Frequency>,
        _args: Vec<Value>,
    ) -> Result<ModuleDetails> {
        Err(StagerunError::module_load(format!(
            "single module runs are not supported by this resolver: {}",
            name
        )))
    }
}

// ============================================================================
// Registry Resolver
// ============================================================================

/// One parsed module list entry before registry lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleEntry {
    pub name: String,
    pub frequency: Option<Frequency>,
    pub args: Vec<Value>,
}

/// Resolver backed by a `ModuleRegistry`, reading module lists from config
#[derive(Debug)]
pub struct RegistryResolver {
    registry: ModuleRegistry,
    sections: Vec<String>,
}

impl RegistryResolver {
    /// Resolver knowing the sections of every `Stage`
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            registry,
            sections: Stage::all_sections().into_iter().map(String::from).collect(),
        }
    }

    /// Accept an additional section name
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.sections.push(section.into());
        self
    }

    pub fn knows_section(&self, section: &str) -> bool {
        self.sections.iter().any(|s| s == section)
    }

    fn details_for(&self, entry: ModuleEntry) -> Result<Option<ModuleDetails>> {
        let Some(name) = canonical_module_name(&entry.name) else {
            warn!("Skipping module entry with an empty name");
            return Ok(None);
        };
        let Some(module) = self.registry.get(&name) else {
            warn!("Could not find module named {}", entry.name);
            return Ok(None);
        };
        let frequency = entry.frequency.unwrap_or(module.meta().frequency);
        ModuleDetails::new(module, name, frequency, entry.args).map(Some)
    }
}

impl ModuleResolver for RegistryResolver {
    fn resolve(&self, section: &str, cfg: &CloudConfig) -> Result<Vec<ModuleDetails>> {
        if !self.knows_section(section) {
            return Err(StagerunError::unknown_section(section));
        }

        let entries = read_module_entries(section, cfg)?;
        let mut details = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(resolved) = self.details_for(entry)? {
                details.push(resolved);
            }
        }
        debug!("Resolved {} modules for section {}", details.len(), section);
        Ok(details)
    }

    fn resolve_module(
        &self,
        name: &str,
        frequency: Option<Frequency>,
        args: Vec<Value>,
    ) -> Result<ModuleDetails> {
        let entry = ModuleEntry {
            name: name.to_string(),
            frequency,
            args,
        };
        self.details_for(entry)?
            .ok_or_else(|| StagerunError::module_load(format!("no module named '{}'", name)))
    }
}

// ============================================================================
// Entry Parsing
// ============================================================================

/// Read the module list for `section` from the configuration.
///
/// A missing section yields an empty list.
pub fn read_module_entries(section: &str, cfg: &CloudConfig) -> Result<Vec<ModuleEntry>> {
    let items = match cfg.get(section) {
        None | Some(Value::Null) => {
            debug!("No '{}' section in configuration", section);
            return Ok(Vec::new());
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(StagerunError::invalid_entry(
                section,
                format!("section must be a list, got {}", other),
            ));
        }
    };

    items
        .iter()
        .map(|item| parse_entry(section, item))
        .collect()
}

fn parse_entry(section: &str, item: &Value) -> Result<ModuleEntry> {
    match item {
        Value::String(name) => Ok(ModuleEntry {
            name: name.clone(),
            frequency: None,
            args: Vec::new(),
        }),
        Value::Array(parts) => {
            let name = match parts.first() {
                Some(Value::String(name)) => name.clone(),
                _ => {
                    return Err(StagerunError::invalid_entry(
                        section,
                        format!("list entry must start with a module name: {}", item),
                    ));
                }
            };
            let frequency = parse_frequency(&name, parts.get(1));
            let args = parts.iter().skip(2).cloned().collect();
            Ok(ModuleEntry {
                name,
                frequency,
                args,
            })
        }
        Value::Object(map) => {
            let name = match map.get("name") {
                Some(Value::String(name)) => name.clone(),
                _ => {
                    return Err(StagerunError::invalid_entry(
                        section,
                        format!("map entry needs a string 'name': {}", item),
                    ));
                }
            };
            let frequency = parse_frequency(&name, map.get("frequency"));
            let args = match map.get("args") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(args)) => args.clone(),
                Some(other) => {
                    return Err(StagerunError::invalid_entry(
                        section,
                        format!("'args' for {} must be a list, got {}", name, other),
                    ));
                }
            };
            Ok(ModuleEntry {
                name,
                frequency,
                args,
            })
        }
        other => Err(StagerunError::invalid_entry(
            section,
            format!("failed to read item {}, unknown type", other),
        )),
    }
}

/// Unknown frequencies are reported and ignored so the module default applies
fn parse_frequency(name: &str, raw: Option<&Value>) -> Option<Frequency> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => match s.parse::<Frequency>() {
            Ok(freq) => Some(freq),
            Err(_) => {
                warn!("Config specified module {} has an unknown frequency {}", name, s);
                None
            }
        },
        Some(other) => {
            warn!("Config specified module {} has an unknown frequency {}", name, other);
            None
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
