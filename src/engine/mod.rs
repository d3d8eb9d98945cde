//! Engine modules: the part that turns a section name into module runs.
//!
//! The orchestrator filters; the runner executes and enforces frequency
//! through a semaphore store. Skip records go through an injectable sink.

pub mod log_sink;
pub mod orchestrator;
pub mod runner;
pub mod semaphores;

pub use log_sink::{ActivationLog, MemoryLog, TracingLog};
pub use orchestrator::{Modules, Verdict};
pub use runner::{ExecutionRunner, Invocation, ModuleFailure, RunReport, SemaphoreRunner};
pub use semaphores::{FileSemaphores, FrequencyStore, MemorySemaphores};
