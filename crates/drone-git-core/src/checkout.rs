//! Fatal-tier checkout step.

use std::path::Path;

use tracing::{debug, info};

use crate::env::Environment;
use crate::error::CheckoutError;
use crate::platform::ScriptFamily;
use crate::process::ProcessRunner;
use crate::workspace::Workspace;

/// Run the bundled checkout script for the host platform in `workdir`.
///
/// Script output goes straight to the plugin's stdout and stderr. Any
/// failure is returned and must fail the step.
pub async fn run_checkout(
    workspace: &Workspace,
    workdir: &Path,
    env: &Environment,
) -> Result<(), CheckoutError> {
    let family = ScriptFamily::host()
        .ok_or_else(|| CheckoutError::UnsupportedPlatform(std::env::consts::OS.to_string()))?;
    checkout_with(family, workspace, workdir, env).await
}

async fn checkout_with(
    family: ScriptFamily,
    workspace: &Workspace,
    workdir: &Path,
    env: &Environment,
) -> Result<(), CheckoutError> {
    let script = workspace.script_path(family.checkout_script());
    debug!(script = %script.display(), workdir = %workdir.display(), "Running checkout");

    let output = ProcessRunner::run(&family.checkout_command(&script), workdir, env).await?;
    info!(duration_ms = output.duration_ms, "Checkout finished");
    Ok(())
}
