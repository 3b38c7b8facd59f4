//! drone-git - Drone CI git clone plugin
//!
//! Runs the bundled checkout script for the host platform, then writes a
//! best-effort build telemetry artifact when `PLUGIN_BUILD_TOOL_FILE` is set.
//! Only a checkout failure changes the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use tracing::{debug, warn};

use drone_git_core::env::absolute_path;
use drone_git_core::logging::level_for;
use drone_git_core::{
    init_tracing, run_checkout, run_telemetry, EngineCollector, Environment, PluginConfig,
    ScriptDetector, Workspace,
};

#[derive(Parser, Debug)]
#[command(name = "drone-git")]
#[command(version = drone_git_core::plugin_version())]
#[command(about = "Drone git clone plugin with build telemetry", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "PLUGIN_DEBUG", value_parser = BoolishValueParser::new())]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "PLUGIN_LOG_JSON", value_parser = BoolishValueParser::new())]
    log_json: bool,

    /// Directory to analyze for telemetry (default: DRONE_WORKSPACE, then current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json, level_for(cli.debug));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // An abandoned metrics run may still hold a blocking thread.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env = Environment::capture();
    let workspace = Workspace::provision().context("failed to provision workspace")?;
    debug!(root = %workspace.root().display(), "Provisioned workspace");

    let workdir = std::env::current_dir().context("failed to resolve current directory")?;
    run_checkout(&workspace, &workdir, &env).await?;

    telemetry(&cli, &workspace, &env).await;

    if let Err(e) = workspace.close() {
        warn!(error = %e, "Failed to remove workspace");
    }
    Ok(())
}

/// Best-effort telemetry pass. Never fails the step.
async fn telemetry(cli: &Cli, workspace: &Workspace, env: &Environment) {
    let target = match analysis_target(cli, env) {
        Ok(dir) => dir,
        Err(e) => {
            warn!(error = %e, "Could not resolve analysis directory, skipping telemetry");
            return;
        }
    };

    let detector = ScriptDetector::new(workspace, env.clone());
    let collector = EngineCollector::tokei();

    match run_telemetry(env, &target, &detector, &collector).await {
        Ok(Some(path)) => debug!(path = %path.display(), "Telemetry artifact written"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to write build tool file"),
    }
}

fn analysis_target(cli: &Cli, env: &Environment) -> std::io::Result<PathBuf> {
    match &cli.workspace {
        Some(dir) => absolute_path(dir),
        None => PluginConfig::from_env(env).analysis_dir(),
    }
}
