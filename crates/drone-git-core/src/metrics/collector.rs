//! Bounded, serialized metrics collection.

use std::any::Any;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::engine::{AnalysisEngine, LanguageRow, TokeiEngine};
use crate::error::CollectError;
use crate::record::MetricsRecord;

/// Wall-clock budget for one analysis.
pub const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(5);

/// Directory names never scanned.
pub const DENY_LIST: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    ".git",
    "__pycache__",
    ".gradle",
    ".m2",
    "coverage",
    "dist",
    ".svn",
    ".hg",
    "bin",
    "obj",
    "Debug",
    "Release",
];

/// Held for the whole engine run, including runs abandoned on timeout.
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Produces code metrics for a directory.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Never fails; problems produce an empty record.
    async fn collect(&self, target: &Path) -> MetricsRecord;
}

/// [`MetricsCollector`] running an [`AnalysisEngine`] on the blocking pool.
///
/// Engine invocations are serialized process-wide. When the timeout
/// expires the invocation is abandoned, not killed: it keeps running in the
/// background and keeps the engine lock until it returns.
pub struct EngineCollector {
    engine: Arc<dyn AnalysisEngine>,
    timeout: Duration,
    excluded: Vec<String>,
}

impl EngineCollector {
    pub fn new(engine: Arc<dyn AnalysisEngine>) -> Self {
        Self {
            engine,
            timeout: DEFAULT_METRICS_TIMEOUT,
            excluded: DENY_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Collector backed by tokei with the default deny list.
    pub fn tokei() -> Self {
        Self::new(Arc::new(TokeiEngine::default()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn try_collect(&self, target: &Path) -> Result<MetricsRecord, CollectError> {
        let engine = Arc::clone(&self.engine);
        let root = target.to_path_buf();
        let excluded = self.excluded.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = ENGINE_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
            let excluded: Vec<&str> = excluded.iter().map(String::as_str).collect();
            engine.analyze(&root, &excluded)
        });

        let rows = match tokio::time::timeout(self.timeout, task).await {
            Err(_) => return Err(CollectError::TimedOut(self.timeout.as_millis() as u64)),
            Ok(Err(join)) if join.is_panic() => {
                return Err(CollectError::Panicked(panic_message(join.into_panic())))
            }
            Ok(Err(join)) => return Err(CollectError::Join(join.to_string())),
            Ok(Ok(result)) => result?,
        };

        Ok(reduce_rows(rows))
    }
}

#[async_trait]
impl MetricsCollector for EngineCollector {
    async fn collect(&self, target: &Path) -> MetricsRecord {
        match self.try_collect(target).await {
            Ok(metrics) => {
                debug!(
                    files = metrics.files,
                    lines = metrics.lines,
                    languages = metrics.languages.len(),
                    "Collected code metrics"
                );
                metrics
            }
            Err(e) => {
                warn!(error = %e, "Failed to collect metrics, using empty metrics");
                MetricsRecord::default()
            }
        }
    }
}

/// Reduce raw engine rows to a [`MetricsRecord`].
///
/// Any `Total` row from the engine is dropped and totals are recomputed
/// from the language rows. Rows without files are dropped.
pub fn reduce_rows(rows: Vec<LanguageRow>) -> MetricsRecord {
    MetricsRecord::from_languages(
        rows.into_iter()
            .filter(|row| !row.name.eq_ignore_ascii_case("total"))
            .filter(|row| row.metrics.files > 0)
            .map(|row| (row.name, row.metrics)),
    )
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
