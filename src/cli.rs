use crate::paths::{DEFAULT_CLOUD_DIR, DEFAULT_INSTANCE_ID};
use crate::types::{Frequency, Stage};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default configuration file
pub const DEFAULT_CONFIG: &str = "/etc/stagerun/stagerun.json";

/// stagerun - boot-stage module runner for host provisioning
#[derive(Parser, Debug)]
#[command(name = "stagerun")]
#[command(about = "Run configuration-driven provisioning modules for a boot stage")]
#[command(version)]
pub struct Cli {
    /// Configuration files, merged in the order given
    #[arg(short, long = "config", global = true, default_value = DEFAULT_CONFIG)]
    pub configs: Vec<PathBuf>,

    /// State directory holding semaphores and per-instance data
    #[arg(long, global = true, default_value = DEFAULT_CLOUD_DIR)]
    pub cloud_dir: PathBuf,

    /// Identity of the current instance
    #[arg(long, global = true, default_value = DEFAULT_INSTANCE_ID)]
    pub instance_id: String,

    /// Distro name; enables the verified-distro gate
    #[arg(long, global = true)]
    pub distro: Option<String>,

    /// Root directory modules write host files under
    #[arg(long, global = true, default_value = "/")]
    pub target_root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every applicable module of a boot stage
    Modules {
        /// Boot stage (init, config, final)
        #[arg(short, long, default_value = "config")]
        mode: Stage,
    },
    /// Run a single module, ignoring activation keys
    Single {
        /// Module name (e.g., runcmd or cc_runcmd)
        #[arg(short, long)]
        name: String,
        /// Override the module's default frequency
        #[arg(short, long)]
        frequency: Option<Frequency>,
        /// Extra arguments passed to the module
        args: Vec<String>,
    },
    /// Show the modules of a stage and what `modules` would do with each,
    /// including the distro gate
    List {
        /// Boot stage (init, config, final)
        #[arg(short, long, default_value = "config")]
        mode: Stage,
        /// Print module metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load the configuration and resolve every stage without running anything
    Validate,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
