//! Logic modules: pure decisions over module metadata and configuration.
//!
//! # Modules
//!
//! - `resolver`: Section module lists to ordered `ModuleDetails`
//! - `activation`: Whether a resolved module applies to the configuration

pub mod activation;
pub mod resolver;

pub use activation::is_active;
pub use resolver::{ModuleDetails, ModuleEntry, ModuleResolver, RegistryResolver};
