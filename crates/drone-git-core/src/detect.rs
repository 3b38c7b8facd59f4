//! Build context detection.
//!
//! Runs the platform's `get-buildtool-lang` script against the checkout
//! and reads back the JSON side channel it writes. Any failure yields an
//! empty [`BuildContext`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::env::{absolute_path, Environment, BUILD_TOOL_FILE};
use crate::error::{DetectError, ExecutionError};
use crate::platform::ScriptFamily;
use crate::process::{ProcessRunner, Sink};
use crate::record::BuildContext;
use crate::workspace::Workspace;

/// Upper bound for one run of the detection script.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Scratch file, inside the workspace, the script writes its result to.
const SIDE_CHANNEL_FILE: &str = "build-tool-lang.json";

/// Best-effort probe for the languages and build tool of a checkout.
#[async_trait]
pub trait BuildContextDetector: Send + Sync {
    /// Never fails; problems produce an empty context.
    async fn detect(&self, target: &Path) -> BuildContext;
}

/// Detector backed by the bundled detection scripts.
pub struct ScriptDetector<'w> {
    workspace: &'w Workspace,
    env: Environment,
    family: Option<ScriptFamily>,
    timeout: Duration,
}

impl<'w> ScriptDetector<'w> {
    /// Detector for the host platform.
    pub fn new(workspace: &'w Workspace, env: Environment) -> Self {
        Self {
            workspace,
            env,
            family: ScriptFamily::host(),
            timeout: DEFAULT_DETECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn side_channel(&self) -> PathBuf {
        self.workspace.root().join(SIDE_CHANNEL_FILE)
    }

    async fn try_detect(&self, target: &Path) -> Result<BuildContext, DetectError> {
        let family = self
            .family
            .ok_or_else(|| DetectError::UnsupportedPlatform(std::env::consts::OS.to_string()))?;

        // The script runs inside the target and also receives it as an
        // argument, so a relative path would be resolved twice.
        let target = absolute_path(target).map_err(|source| DetectError::Target {
            path: target.to_path_buf(),
            source,
        })?;
        let target = target.as_path();

        let output = self.side_channel();
        if let Err(e) = tokio::fs::remove_file(&output).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %output.display(), error = %e, "Could not clear stale detection output");
            }
        }

        let script = self.workspace.script_path(family.detect_script());
        let spec = family
            .detect_command(&script, target)
            .stdout(Sink::Null)
            .stderr(Sink::Capture)
            .timeout(self.timeout);
        let env = self
            .env
            .clone()
            .with(BUILD_TOOL_FILE, output.to_string_lossy());

        if let Err(e) = ProcessRunner::run(&spec, target, &env).await {
            if let ExecutionError::NonZeroExit { stderr, .. } = &e {
                debug!(stderr = %stderr.trim(), "Build tool script stderr");
            }
            return Err(e.into());
        }
        debug!("Build tool script executed successfully");

        let raw = tokio::fs::read(&output)
            .await
            .map_err(|source| DetectError::MissingOutput {
                path: output.clone(),
                source,
            })?;
        parse_side_channel(&raw)
    }
}

#[async_trait]
impl BuildContextDetector for ScriptDetector<'_> {
    async fn detect(&self, target: &Path) -> BuildContext {
        match self.try_detect(target).await {
            Ok(context) => context,
            Err(e) => {
                warn!(error = %e, "Build tool detection failed, continuing with empty values");
                BuildContext::default()
            }
        }
    }
}

/// Parse the script's JSON output. Missing or non-string keys are empty.
pub fn parse_side_channel(raw: &[u8]) -> Result<BuildContext, DetectError> {
    let value: Value = serde_json::from_slice(raw)?;
    let field = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(BuildContext::new(
        field("harness_lang"),
        field("harness_build_tool"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_parse_side_channel() {
        let context =
            parse_side_channel(br#"{"harness_lang": "Go,JavaScript", "harness_build_tool": "Go"}"#)
                .unwrap();
        assert_eq!(context, BuildContext::new("Go,JavaScript", "Go"));
    }

    #[test]
    fn test_parse_side_channel_tolerates_odd_values() {
        let context = parse_side_channel(br#"{"harness_lang": 7}"#).unwrap();
        assert_eq!(context, BuildContext::default());

        let context = parse_side_channel(b"[]").unwrap();
        assert_eq!(context, BuildContext::default());
    }

    #[test]
    fn test_parse_side_channel_rejects_garbage() {
        let err = parse_side_channel(b"harness_lang=Go").unwrap_err();
        assert!(matches!(err, DetectError::Malformed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detects_go_module() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("go.mod"), "module test\n").unwrap();
        std::fs::write(repo.path().join("main.go"), "package main\n").unwrap();

        let detector = ScriptDetector::new(&ws, Environment::capture());
        let context = detector.detect(repo.path()).await;

        assert_eq!(context.languages, "Go");
        assert_eq!(context.build_tool, "Go");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detects_multiple_languages_in_order() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("go.mod"), "module test\n").unwrap();
        std::fs::write(repo.path().join("package.json"), "{}\n").unwrap();

        let detector = ScriptDetector::new(&ws, Environment::capture());
        let context = detector.detect(repo.path()).await;

        assert_eq!(context.languages, "Go,JavaScript");
        assert_eq!(context.build_tool, "Go");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_detects_relative_target() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let repo = tempfile::Builder::new()
            .prefix("detect-relative-")
            .tempdir_in(&cwd)
            .unwrap();
        std::fs::write(repo.path().join("go.mod"), "module test\n").unwrap();
        let relative = repo.path().strip_prefix(&cwd).unwrap();
        assert!(relative.is_relative());

        let detector = ScriptDetector::new(&ws, Environment::capture());
        let context = detector.detect(relative).await;

        assert_eq!(context, BuildContext::new("Go", "Go"));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[traced_test]
    async fn test_failing_script_degrades_to_empty() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        std::fs::write(
            ws.script_path(ScriptFamily::Posix.detect_script()),
            "#!/bin/sh\nexit 2\n",
        )
        .unwrap();
        let repo = tempfile::tempdir().unwrap();

        let detector = ScriptDetector::new(&ws, Environment::capture());
        let context = detector.detect(repo.path()).await;

        assert_eq!(context, BuildContext::default());
        assert!(logs_contain("Build tool detection failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_without_output_degrades_to_empty() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        std::fs::write(
            ws.script_path(ScriptFamily::Posix.detect_script()),
            "#!/bin/sh\nexit 0\n",
        )
        .unwrap();
        let repo = tempfile::tempdir().unwrap();

        let detector = ScriptDetector::new(&ws, Environment::capture());
        let err = detector.try_detect(repo.path()).await.unwrap_err();
        assert!(matches!(err, DetectError::MissingOutput { .. }));
        assert_eq!(detector.detect(repo.path()).await, BuildContext::default());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_script_times_out() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        std::fs::write(
            ws.script_path(ScriptFamily::Posix.detect_script()),
            "#!/bin/sh\nsleep 5\n",
        )
        .unwrap();
        let repo = tempfile::tempdir().unwrap();

        let detector = ScriptDetector::new(&ws, Environment::capture())
            .with_timeout(Duration::from_millis(100));
        let err = detector.try_detect(repo.path()).await.unwrap_err();
        assert!(matches!(
            err,
            DetectError::Script(ExecutionError::TimedOut { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_target_degrades_to_empty() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::provision_in(parent.path()).unwrap();
        let missing = parent.path().join("no-checkout-here");

        let detector = ScriptDetector::new(&ws, Environment::capture());
        assert_eq!(detector.detect(&missing).await, BuildContext::default());
    }
}
