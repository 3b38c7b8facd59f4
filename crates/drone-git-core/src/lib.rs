//! drone-git core library
//!
//! Provides the pieces of the drone-git plugin step:
//! - Provisions an ephemeral workspace holding the bundled helper scripts
//! - Runs the platform checkout script (failures are fatal)
//! - Gathers best-effort build telemetry and writes it as one JSON artifact

pub mod artifact;
pub mod checkout;
pub mod ci_context;
pub mod detect;
pub mod env;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod platform;
pub mod process;
pub mod reconcile;
pub mod record;
pub mod workspace;

// Re-export key types
pub use artifact::ArtifactWriter;
pub use checkout::run_checkout;
pub use ci_context::{build_event_info, CiContext};
pub use detect::{BuildContextDetector, ScriptDetector};
pub use env::{Environment, PluginConfig};
pub use error::{
    CheckoutError, CollectError, DetectError, ExecutionError, PersistError, ProvisionError,
};
pub use logging::init_tracing;
pub use metrics::{AnalysisEngine, EngineCollector, MetricsCollector, TokeiEngine};
pub use platform::ScriptFamily;
pub use process::{CommandSpec, ProcessRunner, RunOutput, Sink};
pub use reconcile::{reconcile, run_telemetry};
pub use record::{plugin_version, BuildContext, LanguageMetrics, MetricsRecord, TelemetryRecord};
pub use workspace::Workspace;
