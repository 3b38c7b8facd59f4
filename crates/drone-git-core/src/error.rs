//! Error taxonomy for drone-git.
//!
//! Two tiers: checkout errors ([`CheckoutError`], [`ProvisionError`],
//! [`ExecutionError`]) fail the step. Telemetry errors ([`DetectError`],
//! [`CollectError`]) are logged where they happen and replaced with empty
//! values. [`PersistError`] is returned to the caller, which logs it.

use std::path::PathBuf;

/// Errors creating or populating the ephemeral workspace.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("failed to create temp dir: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("failed to materialize script {path}: {source}")]
    Materialize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors running an external process.
///
/// The runner never decides whether a failure is fatal; callers do.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {}", display_code(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        /// Captured stderr, empty unless the caller asked for it.
        stderr: String,
    },

    #[error("{program} timed out after {limit_ms}ms")]
    TimedOut { program: String, limit_ms: u64 },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecutionError {
    /// Exit code of the child, when it ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionError::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "signal".to_string(),
    }
}

/// Fatal-tier failures of the checkout step.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("unsupported operating system: {0}")]
    UnsupportedPlatform(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Build-context probe failures. Never leave the detector.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error("no detection script for platform {0}")]
    UnsupportedPlatform(String),

    #[error("cannot resolve detection target {path}: {source}")]
    Target {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("detection script failed: {0}")]
    Script(#[from] ExecutionError),

    #[error("detection output {path} missing: {source}")]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("detection output is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Analysis engine failures. Never leave the collector.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("analysis timed out after {0}ms")]
    TimedOut(u64),

    #[error("analysis panicked: {0}")]
    Panicked(String),

    #[error("analysis task failed: {0}")]
    Join(String),

    #[error("analysis engine error: {0}")]
    Engine(String),
}

/// Failures writing the telemetry artifact.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to serialize telemetry record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write build tool file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
