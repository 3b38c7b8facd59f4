//! Host platform script families.

use std::ffi::OsStr;
use std::path::Path;

use crate::process::CommandSpec;

/// The two supported script families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFamily {
    /// `sh`/`bash` scripts for linux and macOS.
    Posix,
    /// PowerShell scripts for windows.
    Windows,
}

impl ScriptFamily {
    /// Family for an OS name as reported by [`std::env::consts::OS`].
    pub fn for_os(os: &str) -> Option<Self> {
        match os {
            "linux" | "macos" => Some(ScriptFamily::Posix),
            "windows" => Some(ScriptFamily::Windows),
            _ => None,
        }
    }

    /// Family for the running host.
    pub fn host() -> Option<Self> {
        Self::for_os(std::env::consts::OS)
    }

    /// Workspace-relative path of the checkout script.
    pub fn checkout_script(self) -> &'static str {
        match self {
            ScriptFamily::Posix => "posix/script",
            ScriptFamily::Windows => "windows/clone.ps1",
        }
    }

    /// Workspace-relative path of the build tool detection script.
    pub fn detect_script(self) -> &'static str {
        match self {
            ScriptFamily::Posix => "posix/get-buildtool-lang",
            ScriptFamily::Windows => "windows/get-buildtool-lang.ps1",
        }
    }

    pub fn checkout_command(self, script: &Path) -> CommandSpec {
        match self {
            ScriptFamily::Posix => CommandSpec::new(posix_shell(), [script.as_os_str()]),
            ScriptFamily::Windows => CommandSpec::new(
                "pwsh",
                [
                    "-Command".to_string(),
                    format!(
                        "$ErrorActionPreference = 'Stop'; $ProgressPreference = 'SilentlyContinue'; {}",
                        script.display()
                    ),
                ],
            ),
        }
    }

    pub fn detect_command(self, script: &Path, target: &Path) -> CommandSpec {
        match self {
            ScriptFamily::Posix => {
                CommandSpec::new(posix_shell(), [script.as_os_str(), target.as_os_str()])
            }
            ScriptFamily::Windows => CommandSpec::new(
                "pwsh",
                [OsStr::new("-File"), script.as_os_str(), target.as_os_str()],
            ),
        }
    }
}

/// `bash` when it is on `PATH`, `sh` otherwise.
pub fn posix_shell() -> &'static str {
    if which::which("bash").is_ok() {
        "bash"
    } else {
        "sh"
    }
}
