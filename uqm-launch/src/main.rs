//! Terminal front end for the UrQuan Masters launcher
//!
//! ```bash
//! uqm-launch logging on
//! uqm-launch status
//! uqm-launch start --engine ./uqm --lib-dir ./lib
//! ```

mod process;
mod terminal;
mod tracing_support;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use uqm_launcher::permission::BROAD_STORAGE_MIN_SDK;
use uqm_launcher::{EngineLauncherBuilder, LaunchArgumentBuilder, LauncherConfig};

use process::CommandProcessHost;
use terminal::{forward_results, TerminalPermissionHost};
use tracing_support::{init_subscriber, TracingFormat};

#[derive(Parser, Debug)]
#[command(name = "uqm-launch", version, about = "Start The Ur-Quan Masters")]
struct Cli {
    /// Launcher config file
    #[arg(long, global = true, env = "UQM_LAUNCHER_CONFIG")]
    config: Option<PathBuf>,

    /// Launcher log output format
    #[arg(long, global = true, value_enum, default_value_t = TracingFormat::Pretty)]
    log_format: TracingFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Turn engine logging on or off
    Logging {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Show the logging preference and the resulting engine arguments
    Status,

    /// Start the engine
    Start(StartArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(clap::Args, Debug)]
struct StartArgs {
    /// Engine executable
    #[arg(long, default_value = "uqm")]
    engine: PathBuf,

    /// Directory holding the preload libraries
    #[arg(long, default_value = "lib")]
    lib_dir: PathBuf,

    /// Platform API level used to pick the storage permission
    #[arg(long, default_value_t = BROAD_STORAGE_MIN_SDK)]
    sdk_level: u32,

    /// Answer every permission prompt with yes
    #[arg(long, short = 'y')]
    assume_yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(cli.log_format);

    let config_path = cli.config.unwrap_or_else(LauncherConfig::default_path);
    let config = LauncherConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Logging { state } => {
            let enabled = matches!(state, Toggle::On);
            config.preference_store().set(enabled);
            println!("Logging {}", if enabled { "enabled" } else { "disabled" });
        }
        Commands::Status => {
            let pref = config.preference_store().get();
            let launch = LaunchArgumentBuilder::new(config.library.clone()).build(&pref);
            println!("Logging:   {}", if pref.enabled { "on" } else { "off" });
            println!("Log file:  {}", pref.log_file_path.display());
            println!("Libraries: {}", launch.libraries.join(", "));
            println!("Arguments: {}", launch.args.join(" "));
        }
        Commands::Start(args) => start(config, args).await?,
    }

    Ok(())
}

async fn start(config: LauncherConfig, args: StartArgs) -> anyhow::Result<()> {
    let (results_tx, results_rx) = mpsc::unbounded_channel();

    let mut host = TerminalPermissionHost::new(args.sdk_level, results_tx);
    if args.assume_yes {
        host = host.assume_granted();
    }
    let process = Arc::new(CommandProcessHost::new(args.engine, args.lib_dir));

    let launcher = EngineLauncherBuilder::new(config)
        .permission_host(Arc::new(host))
        .process_host(process.clone())
        .build()?;

    let forward = tokio::spawn(forward_results(
        results_rx,
        launcher.coordinator().clone(),
    ));

    let launched = launcher.launch().await;
    forward.abort();
    let report = launched.context("engine failed to start")?;

    if report.logging_degraded {
        eprintln!("Storage permission not granted; starting without a log file");
    }

    tokio::task::spawn_blocking(move || process.wait()).await?;
    Ok(())
}
