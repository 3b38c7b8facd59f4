//! Ephemeral script workspace.
//!
//! A [`Workspace`] is a uniquely named temp directory holding the helper
//! scripts bundled into the binary. It is removed when the value is dropped,
//! which covers early returns and unwinding panics alike.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::ProvisionError;

const PREFIX: &str = "drone-git-";

/// A helper script bundled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct ScriptAsset {
    /// Path relative to the workspace root, `/`-separated.
    pub path: &'static str,
    pub contents: &'static [u8],
}

/// The fixed asset tree: one checkout and one detection script per family.
pub const ASSETS: &[ScriptAsset] = &[
    ScriptAsset {
        path: "posix/script",
        contents: include_bytes!("../assets/posix/script"),
    },
    ScriptAsset {
        path: "posix/get-buildtool-lang",
        contents: include_bytes!("../assets/posix/get-buildtool-lang"),
    },
    ScriptAsset {
        path: "windows/clone.ps1",
        contents: include_bytes!("../assets/windows/clone.ps1"),
    },
    ScriptAsset {
        path: "windows/get-buildtool-lang.ps1",
        contents: include_bytes!("../assets/windows/get-buildtool-lang.ps1"),
    },
];

/// Scoped temp directory with the helper scripts materialized in it.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
}

impl Workspace {
    /// Provision a workspace under the system temp directory.
    pub fn provision() -> Result<Self, ProvisionError> {
        Self::provision_in(std::env::temp_dir())
    }

    /// Provision a workspace under `parent`.
    pub fn provision_in(parent: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir_in(parent)
            .map_err(ProvisionError::CreateDir)?;
        let root = dir.path().to_path_buf();

        // On failure `dir` is dropped here and takes the partial tree with it.
        materialize(&root, ASSETS)?;

        debug!(dir = %root.display(), assets = ASSETS.len(), "Provisioned script workspace");
        Ok(Self {
            dir: Some(dir),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a bundled script, e.g. `posix/script`.
    pub fn script_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Remove the workspace now, reporting the outcome instead of logging it.
    pub fn close(mut self) -> std::io::Result<()> {
        match self.dir.take() {
            Some(dir) => dir.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(dir = %self.root.display(), "Cleaned up temp directory"),
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "Failed to cleanup temp directory")
                }
            }
        }
    }
}

fn materialize(root: &Path, assets: &[ScriptAsset]) -> Result<(), ProvisionError> {
    for asset in assets {
        let dst = asset
            .path
            .split('/')
            .fold(root.to_path_buf(), |path, part| path.join(part));
        write_executable(&dst, asset.contents).map_err(|source| ProvisionError::Materialize {
            path: dst.clone(),
            source,
        })?;
    }
    Ok(())
}

fn write_executable(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}
