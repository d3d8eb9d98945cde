//! Frequency-Gated Module Execution
//!
//! The runner receives the orchestrator's retained invocations, in order, and
//! is the only place that enforces run frequency.
//!
//! # Rules
//!
//! - `always` modules run every time, no semaphore
//! - `once` / `once-per-instance` modules are skipped when the store already
//!   has a semaphore, otherwise the semaphore is written before the run
//! - A failing module is logged and recorded; the remaining modules still run

use crate::config::CloudConfig;
use crate::engine::semaphores::{FileSemaphores, FrequencyStore};
use crate::error::Result;
use crate::logic::resolver::ModuleDetails;
use crate::module_meta::{Module, ModuleContext};
use crate::paths::Paths;
use crate::types::Frequency;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One retained module as handed to the runner: `[module, name, frequency, run_args]`
#[derive(Clone)]
pub struct Invocation {
    pub module: Arc<dyn Module>,
    pub name: String,
    pub frequency: Frequency,
    pub run_args: Vec<Value>,
}

impl Invocation {
    /// Whether this invocation calls exactly `module`
    pub fn is_module(&self, module: &Arc<dyn Module>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.module), Arc::as_ptr(module))
    }

    /// Semaphore name used for frequency bookkeeping
    pub fn semaphore_name(&self) -> String {
        format!("config-{}", self.name)
    }
}

impl From<ModuleDetails> for Invocation {
    fn from(details: ModuleDetails) -> Self {
        let (module, name, frequency, run_args) = details.into_parts();
        Self {
            module,
            name,
            frequency,
            run_args,
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entry(&self.module.meta().id)
            .entry(&self.name)
            .entry(&self.frequency)
            .entry(&self.run_args)
            .finish()
    }
}

/// A module whose run entry point returned an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFailure {
    pub name: String,
    pub error: String,
}

/// Aggregate outcome of one runner call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Modules that ran to completion, in order
    pub ran: Vec<String>,
    /// Modules skipped because their frequency was already satisfied
    pub skipped: Vec<String>,
    pub failures: Vec<ModuleFailure>,
}

impl RunReport {
    /// True when no module failed
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ran, {} skipped, {} failed",
            self.ran.len(),
            self.skipped.len(),
            self.failures.len()
        )
    }
}

/// Executes retained invocations and owns frequency enforcement
pub trait ExecutionRunner {
    /// Run `invocations` in order against the effective configuration
    fn run(&mut self, invocations: Vec<Invocation>, cfg: &CloudConfig) -> Result<RunReport>;
}

/// Runner enforcing frequencies through a `FrequencyStore`
#[derive(Debug)]
pub struct SemaphoreRunner<S: FrequencyStore = FileSemaphores> {
    store: S,
    paths: Paths,
    target_root: PathBuf,
    clear_on_fail: bool,
}

impl SemaphoreRunner<FileSemaphores> {
    /// Runner storing semaphores under the cloud dir of `paths`
    pub fn new(paths: Paths) -> Self {
        Self::with_store(FileSemaphores::new(paths.clone()), paths)
    }
}

impl<S: FrequencyStore> SemaphoreRunner<S> {
    pub fn with_store(store: S, paths: Paths) -> Self {
        Self {
            store,
            paths,
            target_root: PathBuf::from("/"),
            clear_on_fail: false,
        }
    }

    /// Root under which modules write host files
    pub fn with_target_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.target_root = root.into();
        self
    }

    /// Remove a module's semaphore when its run fails, so it is retried
    pub fn clear_on_fail(mut self, clear: bool) -> Self {
        self.clear_on_fail = clear;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: FrequencyStore> ExecutionRunner for SemaphoreRunner<S> {
    fn run(&mut self, invocations: Vec<Invocation>, cfg: &CloudConfig) -> Result<RunReport> {
        let mut report = RunReport::default();

        for invocation in invocations {
            let sem_name = invocation.semaphore_name();
            if self.store.has_run(&sem_name, invocation.frequency)? {
                info!("{} already ran (freq={})", sem_name, invocation.frequency);
                report.skipped.push(invocation.name);
                continue;
            }
            self.store.mark_ran(&sem_name, invocation.frequency)?;

            debug!(
                "Running module {} ({}) with frequency {}",
                invocation.name,
                invocation.module.meta().id,
                invocation.frequency
            );
            let ctx = ModuleContext {
                name: &invocation.name,
                cfg,
                paths: &self.paths,
                target_root: &self.target_root,
            };
            let started = Instant::now();
            let outcome = invocation.module.run(&ctx, &invocation.run_args);
            debug!(
                "Running module {} took {:.3} seconds",
                invocation.name,
                started.elapsed().as_secs_f64()
            );

            match outcome {
                Ok(()) => report.ran.push(invocation.name),
                Err(e) => {
                    warn!(
                        "Running module {} ({}) failed: {:#}",
                        invocation.name,
                        invocation.module.meta().id,
                        e
                    );
                    if self.clear_on_fail {
                        self.store.clear(&sem_name, invocation.frequency)?;
                    }
                    report.failures.push(ModuleFailure {
                        name: invocation.name,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(report)
    }
}
