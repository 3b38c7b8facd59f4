//! Environment snapshot and plugin configuration.
//!
//! Drone passes every plugin setting through environment variables. The
//! process environment is captured once into an [`Environment`] and never
//! re-read, so components stay deterministic under test.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Artifact destination for build tool and telemetry data.
pub const BUILD_TOOL_FILE: &str = "PLUGIN_BUILD_TOOL_FILE";
/// Disables all telemetry when non-empty.
pub const DISABLE_TELEMETRY: &str = "CI_DISABLE_TELEMETRY";
/// Disables code metrics (but not build tool detection) when non-empty.
pub const DISABLE_METRICS: &str = "DISABLE_SCC_METRICS";
pub const REMOTE_URL: &str = "DRONE_REMOTE_URL";
pub const BUILD_EVENT: &str = "DRONE_BUILD_EVENT";
pub const TAG: &str = "DRONE_TAG";
pub const SOURCE_BRANCH: &str = "DRONE_SOURCE_BRANCH";
pub const COMMIT_BRANCH: &str = "DRONE_COMMIT_BRANCH";
pub const COMMIT_SHA: &str = "DRONE_COMMIT_SHA";
/// Directory the repository is cloned into.
pub const WORKSPACE: &str = "DRONE_WORKSPACE";

/// Immutable snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are skipped.
    pub fn capture() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Return the value of `key`, treating an empty value as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Return the value of `key` or an empty string.
    pub fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Whether `key` is set to a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Iterate over all variables, for passing to a child process.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Plugin settings derived from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Where the telemetry artifact is written. `None` disables telemetry.
    pub artifact_path: Option<PathBuf>,

    /// `CI_DISABLE_TELEMETRY` is set.
    pub telemetry_disabled: bool,

    /// `DISABLE_SCC_METRICS` is set.
    pub metrics_disabled: bool,

    /// Directory to analyze, from `DRONE_WORKSPACE`.
    pub workspace_dir: Option<PathBuf>,
}

impl PluginConfig {
    pub fn from_env(env: &Environment) -> Self {
        Self {
            artifact_path: env.get(BUILD_TOOL_FILE).map(PathBuf::from),
            telemetry_disabled: env.is_set(DISABLE_TELEMETRY),
            metrics_disabled: env.is_set(DISABLE_METRICS),
            workspace_dir: env.get(WORKSPACE).map(PathBuf::from),
        }
    }

    /// Directory the telemetry pass analyzes, always absolute.
    ///
    /// `DRONE_WORKSPACE` when set, otherwise the current working directory.
    /// A relative `DRONE_WORKSPACE` is resolved against the current directory.
    pub fn analysis_dir(&self) -> std::io::Result<PathBuf> {
        match &self.workspace_dir {
            Some(dir) => {
                let dir = absolute_path(dir)?;
                tracing::debug!(directory = %dir.display(), "Using DRONE_WORKSPACE for analysis");
                Ok(dir)
            }
            None => {
                let dir = std::env::current_dir()?;
                tracing::debug!(directory = %dir.display(), "Using current directory for analysis");
                Ok(dir)
            }
        }
    }
}

/// Resolve `path` against the current directory unless it is already absolute.
///
/// The path does not have to exist.
pub fn absolute_path(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
