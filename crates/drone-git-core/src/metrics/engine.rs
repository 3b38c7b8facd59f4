//! Code counting engines.

use std::path::Path;

use tokei::{Config, Languages, Report};
use tracing::debug;

use crate::error::CollectError;
use crate::record::LanguageMetrics;

/// One raw per-language row as reported by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageRow {
    pub name: String,
    pub metrics: LanguageMetrics,
}

impl LanguageRow {
    pub fn new(name: impl Into<String>, metrics: LanguageMetrics) -> Self {
        Self {
            name: name.into(),
            metrics,
        }
    }
}

/// A blocking code analyzer.
///
/// Implementations may touch process-wide state; callers must not run two
/// analyses at once (see [`super::EngineCollector`]).
pub trait AnalysisEngine: Send + Sync {
    /// Scan `root` recursively, skipping paths matching `excluded`.
    fn analyze(&self, root: &Path, excluded: &[&str]) -> Result<Vec<LanguageRow>, CollectError>;
}

/// Files larger than this many bytes are skipped.
pub const LARGE_FILE_BYTES: u64 = 1_000_000;

/// Files with more than this many lines are skipped.
pub const LARGE_FILE_LINES: usize = 40_000;

/// [`AnalysisEngine`] backed by tokei.
///
/// VCS ignore files are not honoured; only the caller's exclusions apply.
/// Generated or vendored blobs above [`LARGE_FILE_BYTES`] or
/// [`LARGE_FILE_LINES`] are dropped from the counts.
///
/// tokei does not measure cyclomatic complexity, so that field is zero.
pub struct TokeiEngine {
    config: Config,
}

impl TokeiEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl Default for TokeiEngine {
    fn default() -> Self {
        let mut config = Config::default();
        config.no_ignore_vcs = Some(true);
        Self::new(config)
    }
}

impl AnalysisEngine for TokeiEngine {
    fn analyze(&self, root: &Path, excluded: &[&str]) -> Result<Vec<LanguageRow>, CollectError> {
        if !root.is_dir() {
            debug!(root = %root.display(), "Analysis root is not a directory, nothing to count");
            return Ok(Vec::new());
        }

        let mut languages = Languages::new();
        languages.get_statistics(&[root], excluded, &self.config);

        let mut rows = Vec::new();
        for (language_type, language) in languages.iter() {
            let mut metrics = LanguageMetrics::default();
            for report in &language.reports {
                if is_large(report) {
                    debug!(file = %report.name.display(), "Skipping large file");
                    continue;
                }
                metrics.code += report.stats.code as u64;
                metrics.comments += report.stats.comments as u64;
                metrics.blanks += report.stats.blanks as u64;
                metrics.files += 1;
            }
            if metrics.files == 0 {
                continue;
            }
            metrics.lines = metrics.code + metrics.comments + metrics.blanks;
            rows.push(LanguageRow::new(language_type.name(), metrics));
        }
        Ok(rows)
    }
}

fn is_large(report: &Report) -> bool {
    if report.stats.lines() > LARGE_FILE_LINES {
        return true;
    }
    std::fs::metadata(&report.name)
        .map(|meta| meta.len() > LARGE_FILE_BYTES)
        .unwrap_or(false)
}
