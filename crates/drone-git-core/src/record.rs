//! Persisted telemetry record and its parts.
//!
//! Field names are part of the artifact contract read by downstream
//! consumers and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ci_context::CiContext;

/// Line counts for one language, or for the whole repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageMetrics {
    /// Total lines, `code + comments + blanks`.
    pub lines: u64,
    /// Lines containing code.
    pub code: u64,
    /// Comment-only lines.
    pub comments: u64,
    /// Empty or whitespace-only lines.
    pub blanks: u64,
    /// Cyclomatic complexity sum, zero when the engine does not measure it.
    pub complexity: u64,
    /// Number of files counted.
    pub files: u64,
}

impl LanguageMetrics {
    fn add(&mut self, other: &LanguageMetrics) {
        self.lines += other.lines;
        self.code += other.code;
        self.comments += other.comments;
        self.blanks += other.blanks;
        self.complexity += other.complexity;
        self.files += other.files;
    }
}

/// Repository code metrics.
///
/// The aggregate fields always equal the sum over `languages`. An empty
/// record (all zeros, no languages) is the degraded state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// Sum of `lines` over all languages.
    pub lines: u64,
    /// Sum of `code` over all languages.
    pub code: u64,
    /// Sum of `comments` over all languages.
    pub comments: u64,
    /// Sum of `blanks` over all languages.
    pub blanks: u64,
    /// Sum of `complexity` over all languages.
    pub complexity: u64,
    /// Sum of `files` over all languages.
    pub files: u64,
    /// Per-language breakdown keyed by language name.
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageMetrics>,
}

impl MetricsRecord {
    /// Build a record from per-language breakdowns, recomputing the totals.
    ///
    /// Repeated language names are merged.
    pub fn from_languages<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, LanguageMetrics)>,
        S: Into<String>,
    {
        let mut languages: BTreeMap<String, LanguageMetrics> = BTreeMap::new();
        for (name, metrics) in rows {
            languages.entry(name.into()).or_default().add(&metrics);
        }

        let mut total = LanguageMetrics::default();
        for metrics in languages.values() {
            total.add(metrics);
        }

        Self {
            lines: total.lines,
            code: total.code,
            comments: total.comments,
            blanks: total.blanks,
            complexity: total.complexity,
            files: total.files,
            languages,
        }
    }

    /// Aggregate fields as a [`LanguageMetrics`].
    pub fn totals(&self) -> LanguageMetrics {
        LanguageMetrics {
            lines: self.lines,
            code: self.code,
            comments: self.comments,
            blanks: self.blanks,
            complexity: self.complexity,
            files: self.files,
        }
    }

    /// Whether the aggregate fields equal the sum of the breakdowns.
    pub fn is_consistent(&self) -> bool {
        let mut sum = LanguageMetrics::default();
        for metrics in self.languages.values() {
            sum.add(metrics);
        }
        sum == self.totals()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty() && self.totals() == LanguageMetrics::default()
    }
}

/// Result of the build tool detection script.
///
/// Both fields are always serialized, empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// Comma separated language labels, in detection order.
    #[serde(rename = "harness_lang", default)]
    pub languages: String,

    /// First build tool detected, e.g. `Maven` or `Go`.
    #[serde(rename = "harness_build_tool", default)]
    pub build_tool: String,
}

impl BuildContext {
    pub fn new(languages: impl Into<String>, build_tool: impl Into<String>) -> Self {
        Self {
            languages: languages.into(),
            build_tool: build_tool.into(),
        }
    }
}

/// The complete artifact written to `PLUGIN_BUILD_TOOL_FILE`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Detected languages and build tool, flattened into the top level.
    #[serde(flatten)]
    pub build: BuildContext,

    /// Remote URL of the repository.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repository: String,

    /// Trigger classification, see [`CiContext::build_event`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_event: String,

    /// Tag, branch or commit SHA belonging to `build_event`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_event_value: String,

    /// Code metrics, all zero when collection failed or was disabled.
    pub metrics: MetricsRecord,

    /// Version of the plugin that wrote the artifact.
    pub plugin_version: String,
}

impl TelemetryRecord {
    pub fn new(
        build: BuildContext,
        ci: CiContext,
        metrics: MetricsRecord,
        plugin_version: impl Into<String>,
    ) -> Self {
        Self {
            build,
            repository: ci.repository,
            build_event: ci.build_event,
            build_event_value: ci.build_event_value,
            metrics,
            plugin_version: plugin_version.into(),
        }
    }
}

/// Version recorded when none was stamped in at build time.
pub const DEFAULT_PLUGIN_VERSION: &str = "1.0.0";

/// Version string recorded in every artifact.
///
/// `DRONE_GIT_VERSION` at build time, else [`DEFAULT_PLUGIN_VERSION`].
pub fn plugin_version() -> &'static str {
    resolve_version(option_env!("DRONE_GIT_VERSION"))
}

fn resolve_version(stamped: Option<&'static str>) -> &'static str {
    match stamped {
        Some(v) if !v.is_empty() && v != "dev" => v,
        _ => DEFAULT_PLUGIN_VERSION,
    }
}
