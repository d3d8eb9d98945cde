//! stagerun Library
//!
//! Decides, for a boot stage, which configuration-driven modules apply and
//! runs them as often as their frequency allows.

pub mod builtins;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logic;
pub mod module_meta;
pub mod paths;
pub mod registry;
pub mod types;

// Re-export main types for convenience
pub use config::{CloudConfig, ConfigLoader, FileConfigLoader, StaticConfig};
pub use engine::{
    ActivationLog, ExecutionRunner, FileSemaphores, FrequencyStore, Invocation, MemoryLog,
    MemorySemaphores, ModuleFailure, Modules, RunReport, SemaphoreRunner, TracingLog, Verdict,
};
pub use error::{Result, StagerunError};
pub use logic::{ModuleDetails, ModuleResolver, RegistryResolver, is_active};
pub use module_meta::{MetaBuilder, Module, ModuleContext, ModuleMeta};
pub use paths::Paths;
pub use registry::{ModuleRegistry, canonical_module_name};
pub use types::{Distros, Frequency, Stage};
