//! Atomic persistence of the telemetry artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::env::PluginConfig;
use crate::error::PersistError;
use crate::record::TelemetryRecord;

/// Writes a [`TelemetryRecord`] as pretty JSON.
///
/// The file is written to a sibling temp file and renamed into place, so
/// readers see either the previous content or the complete record.
#[derive(Debug, Clone, Default)]
pub struct ArtifactWriter {
    destination: Option<PathBuf>,
}

impl ArtifactWriter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(destination.into()),
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self {
            destination: config.artifact_path.clone(),
        }
    }

    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    /// Persist `record`. Without a destination this is a no-op.
    pub fn write(&self, record: &TelemetryRecord) -> Result<(), PersistError> {
        let Some(path) = &self.destination else {
            debug!("No artifact destination configured, skipping write");
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(record)?;
        let wrap = |source| PersistError::Write {
            path: path.clone(),
            source,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(parent).map_err(wrap)?;
        tmp.write_all(&json).map_err(wrap)?;
        tmp.as_file().sync_all().map_err(wrap)?;
        set_readable(tmp.path()).map_err(wrap)?;
        tmp.persist(path).map_err(|e| wrap(e.error))?;

        info!(path = %path.display(), bytes = json.len(), "Wrote telemetry artifact");
        Ok(())
    }
}

#[cfg(unix)]
fn set_readable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_readable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
