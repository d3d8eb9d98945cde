//! stagerun - main entry point
//!
//! Wires the file config loader, the built-in registry and the semaphore
//! runner into a `Modules` orchestrator and dispatches the subcommand.

use anyhow::{Context, Result};
use serde_json::Value;
use stagerun::cli::{Cli, Commands};
use stagerun::{
    FileConfigLoader, ModuleRegistry, Modules, Paths, RegistryResolver, RunReport,
    SemaphoreRunner, Stage,
};
use strum::IntoEnumIterator;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Initialize the logger; `RUST_LOG` overrides the default `info` filter
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_modules(cli: &Cli) -> Result<Modules> {
    let registry =
        ModuleRegistry::with_builtin_modules().context("Failed to register built-in modules")?;
    debug!("Registered {} modules", registry.len());

    let paths = Paths::checked(&cli.cloud_dir, &cli.instance_id)?;
    let runner = SemaphoreRunner::new(paths).with_target_root(&cli.target_root);
    let loader = FileConfigLoader::new(cli.configs.iter().cloned());

    let mut modules = Modules::new(loader, RegistryResolver::new(registry), runner);
    if let Some(distro) = &cli.distro {
        modules = modules.with_distro(distro);
    }
    Ok(modules)
}

fn report_outcome(what: &str, report: &RunReport) -> Result<()> {
    if report.succeeded() {
        info!("{}: {}", what, report.summary());
        return Ok(());
    }
    for failure in &report.failures {
        error!("Module {} failed: {}", failure.name, failure.error);
    }
    eprintln!("✗ {}: {}", what, report.summary());
    std::process::exit(1);
}

fn list_stage(modules: &mut Modules, stage: Stage, json: bool) -> Result<()> {
    let plan = modules
        .plan(stage.section())
        .with_context(|| format!("Failed to resolve stage {}", stage))?;

    if json {
        let entries: Vec<Value> = plan
            .iter()
            .map(|(d, verdict)| {
                serde_json::json!({
                    "name": d.name(),
                    "frequency": d.frequency(),
                    "args": d.run_args(),
                    "verdict": verdict.to_string(),
                    "runs": verdict.runs(),
                    "meta": d.module().meta(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    match modules.distro() {
        Some(distro) => println!("{} ({}) on {}", stage, stage.section(), distro),
        None => println!("{} ({})", stage, stage.section()),
    }
    for (d, verdict) in &plan {
        println!("  {:<20} {:<18} {}", d.name(), d.frequency(), verdict);
    }
    Ok(())
}

fn validate(modules: &mut Modules) -> Result<()> {
    modules.config().context("Failed to load configuration")?;
    for stage in Stage::iter() {
        let details = modules
            .resolve(stage.section())
            .with_context(|| format!("Failed to resolve stage {}", stage))?;
        println!("✓ {}: {} modules", stage, details.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);
    let mut modules = build_modules(&cli)?;

    match cli.command {
        Commands::Modules { mode } => {
            info!("Running modules for stage {} ({})", mode, mode.section());
            let report = modules.run_section(mode.section())?;
            report_outcome(&format!("stage {}", mode), &report)?;
        }
        Commands::Single {
            name,
            frequency,
            args,
        } => {
            info!("Running single module {}", name);
            let args = args.into_iter().map(Value::String).collect();
            let report = modules.run_single(&name, frequency, args)?;
            report_outcome(&format!("module {}", name), &report)?;
        }
        Commands::List { mode, json } => list_stage(&mut modules, mode, json)?,
        Commands::Validate => validate(&mut modules)?,
    }

    Ok(())
}
