//! Module registry and canonical module naming.
//!
//! Module lists in configuration are written by hand, so the same module can
//! show up as `runcmd`, `cc_runcmd`, `cc_runcmd.py` or `run-cmd`. Every lookup
//! goes through `canonical_module_name` first.

use crate::builtins;
use crate::error::{Result, StagerunError};
use crate::module_meta::Module;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Normalize a module name as written in configuration.
///
/// Returns `None` when nothing is left after normalization.
pub fn canonical_module_name(raw: &str) -> Option<String> {
    let mut name = raw.trim();
    if let Some(stripped) = name.strip_suffix(".py") {
        name = stripped;
    }
    if let Some(stripped) = name.strip_prefix("cc_") {
        name = stripped;
    }
    let name = name.replace('-', "_");
    if name.is_empty() { None } else { Some(name) }
}

/// Registry of known modules, keyed by canonical name
#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn Module>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under the canonical form of its meta name
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<()> {
        let raw = &module.meta().name;
        let name = canonical_module_name(raw)
            .ok_or_else(|| StagerunError::module_load("module name cannot be empty"))?;
        if self.modules.contains_key(&name) {
            return Err(StagerunError::module_load(format!(
                "module '{}' is already registered",
                name
            )));
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Look up a module by any accepted spelling of its name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        let name = canonical_module_name(name)?;
        self.modules.get(&name).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registered modules in name order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Module>> {
        self.modules.values()
    }

    /// Create a registry with the built-in modules
    pub fn with_builtin_modules() -> Result<Self> {
        let mut registry = Self::new();
        for module in builtins::all()? {
            registry.register(module)?;
        }
        Ok(registry)
    }
}
