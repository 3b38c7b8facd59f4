//! Telemetry reconciliation.
//!
//! Merges CI context, build context detection and code metrics into one
//! [`TelemetryRecord`]. Every input is best-effort; only the final write
//! can fail.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::artifact::ArtifactWriter;
use crate::ci_context::CiContext;
use crate::detect::BuildContextDetector;
use crate::env::{Environment, PluginConfig};
use crate::error::PersistError;
use crate::metrics::MetricsCollector;
use crate::record::{plugin_version, MetricsRecord, TelemetryRecord};

/// Build the telemetry record for `target`.
///
/// Returns `None`, without touching the detector or the collector, when no
/// artifact destination is configured or telemetry is disabled.
pub async fn reconcile(
    env: &Environment,
    target: &Path,
    detector: &dyn BuildContextDetector,
    collector: &dyn MetricsCollector,
) -> Option<TelemetryRecord> {
    let config = PluginConfig::from_env(env);

    if config.artifact_path.is_none() {
        debug!("PLUGIN_BUILD_TOOL_FILE not set, skipping telemetry");
        return None;
    }
    if config.telemetry_disabled {
        debug!("Telemetry disabled via CI_DISABLE_TELEMETRY");
        return None;
    }

    let build = detector.detect(target).await;
    debug!(
        languages = %build.languages,
        build_tool = %build.build_tool,
        "Detected build context"
    );

    let metrics = if config.metrics_disabled {
        debug!("Metrics disabled via DISABLE_SCC_METRICS");
        MetricsRecord::default()
    } else {
        collector.collect(target).await
    };

    let ci = CiContext::from_env(env);
    Some(TelemetryRecord::new(build, ci, metrics, plugin_version()))
}

/// Reconcile and persist in one step.
///
/// Returns the artifact path when a record was written.
pub async fn run_telemetry(
    env: &Environment,
    target: &Path,
    detector: &dyn BuildContextDetector,
    collector: &dyn MetricsCollector,
) -> Result<Option<PathBuf>, PersistError> {
    let Some(record) = reconcile(env, target, detector, collector).await else {
        return Ok(None);
    };

    let writer = ArtifactWriter::from_config(&PluginConfig::from_env(env));
    writer.write(&record)?;

    let path = writer.destination().map(Path::to_path_buf);
    info!(
        languages = %record.build.languages,
        build_tool = %record.build.build_tool,
        files = record.metrics.files,
        "Telemetry collected"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{BUILD_EVENT, BUILD_TOOL_FILE, COMMIT_BRANCH, DISABLE_METRICS, DISABLE_TELEMETRY};
    use crate::record::{BuildContext, LanguageMetrics};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDetector(AtomicUsize);

    #[async_trait]
    impl BuildContextDetector for CountingDetector {
        async fn detect(&self, _: &Path) -> BuildContext {
            self.0.fetch_add(1, Ordering::SeqCst);
            BuildContext::new("Go", "Go")
        }
    }

    #[derive(Default)]
    struct CountingCollector(AtomicUsize);

    #[async_trait]
    impl MetricsCollector for CountingCollector {
        async fn collect(&self, _: &Path) -> MetricsRecord {
            self.0.fetch_add(1, Ordering::SeqCst);
            MetricsRecord::from_languages([(
                "Go",
                LanguageMetrics {
                    lines: 12,
                    code: 10,
                    comments: 1,
                    blanks: 1,
                    complexity: 0,
                    files: 2,
                },
            )])
        }
    }

    #[tokio::test]
    async fn test_no_destination_skips_all_work() {
        let (detector, collector) = (CountingDetector::default(), CountingCollector::default());
        let env: Environment = [(BUILD_EVENT, "push")].into_iter().collect();

        let record = reconcile(&env, Path::new("."), &detector, &collector).await;
        assert!(record.is_none());
        assert_eq!(detector.0.load(Ordering::SeqCst), 0);
        assert_eq!(collector.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disable_flag_skips_all_work() {
        let (detector, collector) = (CountingDetector::default(), CountingCollector::default());
        let env: Environment = [(BUILD_TOOL_FILE, "/tmp/out.json"), (DISABLE_TELEMETRY, "true")]
            .into_iter()
            .collect();

        assert!(reconcile(&env, Path::new("."), &detector, &collector)
            .await
            .is_none());
        assert_eq!(detector.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_metrics_disable_substitutes_zero() {
        let (detector, collector) = (CountingDetector::default(), CountingCollector::default());
        let env: Environment = [(BUILD_TOOL_FILE, "/tmp/out.json"), (DISABLE_METRICS, "1")]
            .into_iter()
            .collect();

        let record = reconcile(&env, Path::new("."), &detector, &collector)
            .await
            .unwrap();
        assert!(record.metrics.is_empty());
        assert_eq!(record.build, BuildContext::new("Go", "Go"));
        assert_eq!(collector.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_record_is_assembled() {
        let (detector, collector) = (CountingDetector::default(), CountingCollector::default());
        let env: Environment = [
            (BUILD_TOOL_FILE, "/tmp/out.json"),
            (BUILD_EVENT, "push"),
            (COMMIT_BRANCH, "main"),
        ]
        .into_iter()
        .collect();

        let record = reconcile(&env, Path::new("."), &detector, &collector)
            .await
            .unwrap();
        assert_eq!(record.build_event, "branch");
        assert_eq!(record.build_event_value, "main");
        assert_eq!(record.metrics.lines, 12);
        assert!(record.metrics.is_consistent());
        assert_eq!(record.plugin_version, plugin_version());
        assert_eq!(detector.0.load(Ordering::SeqCst), 1);
        assert_eq!(collector.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_telemetry_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.json");
        let env: Environment = [(BUILD_TOOL_FILE, out.to_string_lossy().into_owned())]
            .into_iter()
            .collect();

        let written = run_telemetry(
            &env,
            dir.path(),
            &CountingDetector::default(),
            &CountingCollector::default(),
        )
        .await
        .unwrap();

        assert_eq!(written.as_deref(), Some(out.as_path()));
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_run_telemetry_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("missing").join("out.json");
        let env: Environment = [(BUILD_TOOL_FILE, out.to_string_lossy().into_owned())]
            .into_iter()
            .collect();

        let err = run_telemetry(
            &env,
            dir.path(),
            &CountingDetector::default(),
            &CountingCollector::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PersistError::Write { .. }));
    }
}
