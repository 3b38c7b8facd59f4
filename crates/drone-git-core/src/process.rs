//! External process execution.
//!
//! Used by both the checkout (fatal on error) and build-context detection
//! (errors degrade to empty values), so the runner only reports outcomes.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::debug;

use crate::env::Environment;
use crate::error::ExecutionError;

/// Where a child's output stream goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sink {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Collect into [`RunOutput`].
    Capture,
    /// Discard.
    Null,
}

impl Sink {
    fn stdio(self) -> Stdio {
        match self {
            Sink::Inherit => Stdio::inherit(),
            Sink::Capture => Stdio::piped(),
            Sink::Null => Stdio::null(),
        }
    }
}

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Executable name or path, looked up on `PATH` when bare.
    pub program: String,
    /// Arguments passed verbatim, without shell interpretation.
    pub args: Vec<OsString>,
    /// Destination of the child's stdout.
    pub stdout: Sink,
    /// Destination of the child's stderr.
    pub stderr: Sink,
    /// Wall-clock limit. The child is killed when it is exceeded.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdout: Sink::Inherit,
            stderr: Sink::Inherit,
            timeout: None,
        }
    }

    pub fn stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Shell-like rendering for trace logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit status of the child, always zero for a successful run.
    pub exit_code: i32,

    /// Captured stdout, empty unless the sink was [`Sink::Capture`].
    pub stdout: String,

    /// Captured stderr, empty unless the sink was [`Sink::Capture`].
    pub stderr: String,

    /// Wall-clock time from spawn to exit.
    pub duration_ms: u64,
}

/// Spawns one process per call and waits for it. No retries.
pub struct ProcessRunner;

impl ProcessRunner {
    /// Run `spec` in `workdir` with exactly the variables of `env`.
    pub async fn run(
        spec: &CommandSpec,
        workdir: &Path,
        env: &Environment,
    ) -> Result<RunOutput, ExecutionError> {
        let start = Instant::now();
        debug!("+ {}", spec.display());

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(workdir)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(spec.stdout.stdio())
            .stderr(spec.stderr.stdio())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                ExecutionError::TimedOut {
                    program: spec.program.clone(),
                    limit_ms: limit.as_millis() as u64,
                }
            })?,
            None => wait.await,
        }
        .map_err(|source| ExecutionError::Wait {
            program: spec.program.clone(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(ExecutionError::NonZeroExit {
                program: spec.program.clone(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(RunOutput {
            exit_code: output.status.code().unwrap_or_default(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn host_env() -> Environment {
        Environment::capture()
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("echo", ["hello"]).stdout(Sink::Capture);

        let output = ProcessRunner::run(&spec, dir.path(), &host_env())
            .await
            .expect("echo should succeed");
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_uses_workdir_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let env = host_env().with("DRONE_GIT_PROBE", "probe-value");
        let spec = CommandSpec::new("sh", ["-c", "pwd; echo $DRONE_GIT_PROBE"]).stdout(Sink::Capture);

        let output = ProcessRunner::run(&spec, dir.path(), &env).await.unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert!(output.stdout.contains(canonical.to_str().unwrap()));
        assert!(output.stdout.contains("probe-value"));
    }

    #[tokio::test]
    async fn test_run_reports_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh", ["-c", "echo broken >&2; exit 3"]).stderr(Sink::Capture);

        let err = ProcessRunner::run(&spec, dir.path(), &host_env())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(3));
        match err {
            ExecutionError::NonZeroExit { stderr, .. } => assert!(stderr.contains("broken")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("drone-git-no-such-binary", Vec::<String>::new());

        let err = ProcessRunner::run(&spec, dir.path(), &host_env())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_enforces_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sleep", ["5"]).timeout(Duration::from_millis(100));

        let start = Instant::now();
        let err = ProcessRunner::run(&spec, dir.path(), &host_env())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut { limit_ms: 100, .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_display_joins_args() {
        let spec = CommandSpec::new("bash", ["/tmp/ws/posix/script"]);
        assert_eq!(spec.display(), "bash /tmp/ws/posix/script");
    }
}
