//! Run-Section Orchestrator
//!
//! `Modules` decides, for one section of the configuration, which modules run
//! and hands them to the execution runner.
//!
//! # Flow
//!
//! ```text
//! load config (once, cached)
//!     ↓
//! resolver: section → ordered ModuleDetails
//!     ↓
//! per module: verdict (is_active? → distro verified?) → retain as Invocation
//!     ↓
//! runner.run(retained)   (exactly once per call, possibly empty)
//! ```
//!
//! # Design Principles
//!
//! - **Config cached per instance**: the loader runs at most once until
//!   `invalidate_config` is called
//! - **Order preserved**: retained modules keep the resolver's order
//! - **Skips are records, not errors**: each skipped module gets one INFO record
//!   at the point it is filtered out
//! - **No frequency checks here**: the runner owns them
//! - **Collaborator errors propagate unmodified**

use crate::config::{CloudConfig, ConfigLoader};
use crate::engine::log_sink::{ActivationLog, TracingLog};
use crate::engine::runner::{ExecutionRunner, Invocation, RunReport};
use crate::error::Result;
use crate::logic::activation::is_active;
use crate::logic::resolver::{ModuleDetails, ModuleResolver};
use crate::registry::canonical_module_name;
use crate::types::Frequency;
use serde_json::Value;
use strum::Display;
use tracing::{Level, debug};

/// Config key listing modules allowed to run on unverified distros
pub const UNVERIFIED_MODULES_KEY: &str = "unverified_modules";

/// Record emitted for a module whose activation keys are all absent
pub fn inapplicable_message(name: &str) -> String {
    format!(
        "Skipping modules '{}' because no applicable config is provided.",
        name
    )
}

/// Record emitted for a module not verified on the current distro
pub fn unverified_message(name: &str, distro: &str) -> String {
    format!(
        "Skipping modules '{}' because they are not verified on distro '{}'. \
         To run anyway, add them to '{}' in config.",
        name, distro, UNVERIFIED_MODULES_KEY
    )
}

/// Record emitted when an unverified module is forced to run
pub fn forced_message(name: &str) -> String {
    format!("running {}: '{}'", UNVERIFIED_MODULES_KEY, name)
}

/// What `run_section` does with one resolved module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    /// Applicable and verified; handed to the runner
    Run,
    /// Not verified on the distro but listed under `unverified_modules`
    Forced,
    /// None of the activation keys is present
    Inactive,
    /// Not verified on the distro
    Unverified,
}

impl Verdict {
    /// Whether the module reaches the runner
    pub fn runs(self) -> bool {
        matches!(self, Self::Run | Self::Forced)
    }
}

/// Activation first, then the distro gate
fn verdict(
    details: &ModuleDetails,
    cfg: &CloudConfig,
    distro: Option<&str>,
    overridden: &[String],
) -> Verdict {
    if !is_active(details, cfg) {
        return Verdict::Inactive;
    }
    let Some(distro) = distro else {
        return Verdict::Run;
    };
    if details.module().meta().distros.supports(distro) {
        return Verdict::Run;
    }
    let canonical = canonical_module_name(details.name());
    if overridden.iter().any(|name| Some(name) == canonical.as_ref()) {
        Verdict::Forced
    } else {
        Verdict::Unverified
    }
}

/// Orchestrates module sections for one boot.
///
/// Calls take `&mut self`; one orchestrator serves one controlling process.
pub struct Modules {
    loader: Box<dyn ConfigLoader>,
    resolver: Box<dyn ModuleResolver>,
    runner: Box<dyn ExecutionRunner>,
    log: Box<dyn ActivationLog>,
    distro: Option<String>,
    cached_cfg: Option<CloudConfig>,
}

impl Modules {
    /// Create an orchestrator logging through `tracing`, with the distro gate off
    pub fn new(
        loader: impl ConfigLoader + 'static,
        resolver: impl ModuleResolver + 'static,
        runner: impl ExecutionRunner + 'static,
    ) -> Self {
        Self {
            loader: Box::new(loader),
            resolver: Box::new(resolver),
            runner: Box::new(runner),
            log: Box::new(TracingLog),
            distro: None,
            cached_cfg: None,
        }
    }

    /// Replace the skip-record sink
    pub fn with_log(mut self, log: impl ActivationLog + 'static) -> Self {
        self.log = Box::new(log);
        self
    }

    /// Enable the distro gate for `distro`
    pub fn with_distro(mut self, distro: impl Into<String>) -> Self {
        self.distro = Some(distro.into());
        self
    }

    /// Seed the config cache so the loader is never called
    pub fn with_cached_config(mut self, cfg: CloudConfig) -> Self {
        self.cached_cfg = Some(cfg);
        self
    }

    pub fn distro(&self) -> Option<&str> {
        self.distro.as_deref()
    }

    /// Effective configuration, loading it on first use
    pub fn config(&mut self) -> Result<&CloudConfig> {
        cached_config(&mut self.cached_cfg, self.loader.as_mut())
    }

    /// Drop the cached configuration; the next call reloads it
    pub fn invalidate_config(&mut self) {
        self.cached_cfg = None;
    }

    /// Ordered candidate modules for `section`, before any filtering
    pub fn resolve(&mut self, section: &str) -> Result<Vec<ModuleDetails>> {
        let cfg = cached_config(&mut self.cached_cfg, self.loader.as_mut())?;
        self.resolver.resolve(section, cfg)
    }

    /// Run every applicable module of `section`.
    ///
    /// The runner is called exactly once with the retained modules, and its
    /// report is returned as is.
    pub fn run_section(&mut self, section: &str) -> Result<RunReport> {
        let cfg = cached_config(&mut self.cached_cfg, self.loader.as_mut())?;
        let candidates = self.resolver.resolve(section, cfg)?;
        let overridden = unverified_overrides(cfg);
        let distro = self.distro.as_deref();

        let mut retained: Vec<Invocation> = Vec::with_capacity(candidates.len());
        for details in candidates {
            match verdict(&details, cfg, distro, &overridden) {
                Verdict::Run => {}
                Verdict::Forced => self.log.record(Level::INFO, forced_message(details.name())),
                Verdict::Inactive => {
                    self.log.record(Level::INFO, inapplicable_message(details.name()));
                    continue;
                }
                Verdict::Unverified => {
                    self.log.record(
                        Level::INFO,
                        unverified_message(details.name(), distro.unwrap_or_default()),
                    );
                    continue;
                }
            }
            retained.push(Invocation::from(details));
        }

        debug!(
            "Section {}: running {} modules",
            section,
            retained.len()
        );
        self.runner.run(retained, cfg)
    }

    /// Resolved modules of `section` with the verdict `run_section` would
    /// reach for each. Nothing is logged or run.
    pub fn plan(&mut self, section: &str) -> Result<Vec<(ModuleDetails, Verdict)>> {
        let cfg = cached_config(&mut self.cached_cfg, self.loader.as_mut())?;
        let candidates = self.resolver.resolve(section, cfg)?;
        let overridden = unverified_overrides(cfg);
        let distro = self.distro.as_deref();
        Ok(candidates
            .into_iter()
            .map(|details| {
                let verdict = verdict(&details, cfg, distro, &overridden);
                (details, verdict)
            })
            .collect())
    }

    /// Run one module by name, bypassing activation keys and the distro gate
    pub fn run_single(
        &mut self,
        name: &str,
        frequency: Option<Frequency>,
        args: Vec<Value>,
    ) -> Result<RunReport> {
        let cfg = cached_config(&mut self.cached_cfg, self.loader.as_mut())?;
        let details = self.resolver.resolve_module(name, frequency, args)?;
        debug!(
            "Running single module {} with frequency {}",
            details.name(),
            details.frequency()
        );
        self.runner.run(vec![Invocation::from(details)], cfg)
    }
}

impl std::fmt::Debug for Modules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Modules")
            .field("distro", &self.distro)
            .field("config_cached", &self.cached_cfg.is_some())
            .finish_non_exhaustive()
    }
}

fn cached_config<'a>(
    slot: &'a mut Option<CloudConfig>,
    loader: &mut dyn ConfigLoader,
) -> Result<&'a CloudConfig> {
    if slot.is_none() {
        debug!("Loading effective configuration");
        *slot = Some(loader.load_effective_config()?);
    }
    Ok(slot.get_or_insert_with(CloudConfig::new))
}

/// Canonical names listed under `unverified_modules`
fn unverified_overrides(cfg: &CloudConfig) -> Vec<String> {
    match cfg.get(UNVERIFIED_MODULES_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(canonical_module_name)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::engine::log_sink::MemoryLog;
    use crate::error::StagerunError;
    use crate::module_meta::{Module, ModuleContext, ModuleMeta};
    use crate::types::Distros;
    use std::sync::Arc;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Loader counting its calls
    struct CountingLoader {
        calls: Rc<Cell<usize>>,
    }

    impl ConfigLoader for CountingLoader {
        fn load_effective_config(&mut self) -> Result<CloudConfig> {
            self.calls.set(self.calls.get() + 1);
            Ok(CloudConfig::new())
        }
    }

    struct FailingLoader;

    impl ConfigLoader for FailingLoader {
        fn load_effective_config(&mut self) -> Result<CloudConfig> {
            Err(StagerunError::config("broken merge"))
        }
    }

    struct EmptyResolver;

    impl ModuleResolver for EmptyResolver {
        fn resolve(&self, _section: &str, _cfg: &CloudConfig) -> Result<Vec<ModuleDetails>> {
            Ok(Vec::new())
        }
    }

    struct NullRunner;

    impl ExecutionRunner for NullRunner {
        fn run(&mut self, invocations: Vec<Invocation>, _cfg: &CloudConfig) -> Result<RunReport> {
            Ok(RunReport {
                ran: invocations.into_iter().map(|i| i.name).collect(),
                ..RunReport::default()
            })
        }
    }

    #[test]
    fn test_config_loaded_once() {
        let calls = Rc::new(Cell::new(0));
        let mut modules = Modules::new(
            CountingLoader {
                calls: calls.clone(),
            },
            EmptyResolver,
            NullRunner,
        );

        modules.run_section("cloud_init_modules").unwrap();
        modules.run_section("cloud_config_modules").unwrap();
        modules.run_section("cloud_final_modules").unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_invalidate_config_reloads() {
        let calls = Rc::new(Cell::new(0));
        let mut modules = Modules::new(
            CountingLoader {
                calls: calls.clone(),
            },
            EmptyResolver,
            NullRunner,
        );

        modules.config().unwrap();
        modules.invalidate_config();
        modules.config().unwrap();

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_seeded_cache_skips_loader() {
        let mut modules = Modules::new(FailingLoader, EmptyResolver, NullRunner)
            .with_cached_config(CloudConfig::new());
        assert!(modules.run_section("cloud_init_modules").is_ok());
    }

    #[test]
    fn test_loader_error_propagates() {
        let mut modules = Modules::new(FailingLoader, EmptyResolver, NullRunner);
        let result = modules.run_section("cloud_init_modules");
        assert!(matches!(result, Err(StagerunError::Config(_))));
    }

    #[test]
    fn test_empty_section_logs_nothing() {
        let log = MemoryLog::new();
        let mut modules =
            Modules::new(StaticConfig::default(), EmptyResolver, NullRunner).with_log(log.clone());

        let report = modules.run_section("cloud_init_modules").unwrap();

        assert!(report.ran.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            inapplicable_message("ntp"),
            "Skipping modules 'ntp' because no applicable config is provided."
        );
        assert_eq!(
            unverified_message("apt_configure", "arch"),
            "Skipping modules 'apt_configure' because they are not verified on distro 'arch'. \
             To run anyway, add them to 'unverified_modules' in config."
        );
        assert_eq!(forced_message("ntp"), "running unverified_modules: 'ntp'");
    }

    struct Stub(ModuleMeta);

    impl Module for Stub {
        fn meta(&self) -> &ModuleMeta {
            &self.0
        }

        fn run(&self, _ctx: &ModuleContext<'_>, _args: &[Value]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Resolver returning a fixed list for every section
    struct FixedResolver(Vec<ModuleDetails>);

    impl ModuleResolver for FixedResolver {
        fn resolve(&self, _section: &str, _cfg: &CloudConfig) -> Result<Vec<ModuleDetails>> {
            Ok(self.0.clone())
        }
    }

    fn details(meta: ModuleMeta) -> ModuleDetails {
        let name = meta.name.clone();
        ModuleDetails::new(Arc::new(Stub(meta)), name, Frequency::Once, vec![]).unwrap()
    }

    fn gated_modules() -> Vec<ModuleDetails> {
        vec![
            details(ModuleMeta::builder("ntp", "NTP").build().unwrap()),
            details(
                ModuleMeta::builder("apt_configure", "Apt")
                    .distros(Distros::only(["debian"]))
                    .build()
                    .unwrap(),
            ),
            details(
                ModuleMeta::builder("yum_add_repo", "Yum")
                    .distros(Distros::only(["fedora"]))
                    .build()
                    .unwrap(),
            ),
            details(
                ModuleMeta::builder("runcmd", "Runcmd")
                    .activate_by_schema_keys(["runcmd"])
                    .build()
                    .unwrap(),
            ),
        ]
    }

    #[test]
    fn test_plan_matches_run_section() {
        let cfg = serde_json::json!({"unverified_modules": ["cc_yum-add-repo"]});
        let cfg = cfg.as_object().cloned().unwrap();
        let log = MemoryLog::new();
        let mut modules = Modules::new(StaticConfig::new(cfg), FixedResolver(gated_modules()), NullRunner)
            .with_distro("arch")
            .with_log(log.clone());

        let plan = modules.plan("cloud_config_modules").unwrap();
        let verdicts: Vec<(&str, Verdict)> =
            plan.iter().map(|(d, v)| (d.name(), *v)).collect();
        assert_eq!(
            verdicts,
            vec![
                ("ntp", Verdict::Run),
                ("apt_configure", Verdict::Unverified),
                ("yum_add_repo", Verdict::Forced),
                ("runcmd", Verdict::Inactive),
            ]
        );
        assert!(log.is_empty(), "plan must not record anything");

        let report = modules.run_section("cloud_config_modules").unwrap();
        let planned: Vec<&str> = plan
            .iter()
            .filter(|(_, v)| v.runs())
            .map(|(d, _)| d.name())
            .collect();
        assert_eq!(report.ran, planned);
        assert_eq!(log.records().len(), 3);
    }

    #[test]
    fn test_plan_without_distro_ignores_gate() {
        let mut modules =
            Modules::new(StaticConfig::default(), FixedResolver(gated_modules()), NullRunner);

        assert_eq!(modules.distro(), None);
        let plan = modules.plan("cloud_config_modules").unwrap();
        let runs: Vec<bool> = plan.iter().map(|(_, v)| v.runs()).collect();
        assert_eq!(runs, vec![true, true, true, false]);
        assert_eq!(Verdict::Unverified.to_string(), "unverified");
    }

    #[test]
    fn test_unverified_overrides_are_canonical() {
        let mut cfg = CloudConfig::new();
        cfg.insert(
            UNVERIFIED_MODULES_KEY.to_string(),
            serde_json::json!(["cc_apt-configure", 7, "ntp"]),
        );
        assert_eq!(unverified_overrides(&cfg), vec!["apt_configure", "ntp"]);
    }
}
