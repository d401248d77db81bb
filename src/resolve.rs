//! Locating the server executable.
//!
//! An explicit override from configuration wins and is used verbatim.
//! Otherwise the executable bundled with the installed extension is looked
//! up per platform: `server/bin/` directly when the server ships a flat
//! layout, else the platform-named subdirectory.

use std::path::{Path, PathBuf};

use crate::session::StartError;

const SERVER_DIR: &str = "server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else {
            None
        }
    }

    fn fallback_dir(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
            Self::MacOs => "macOS",
        }
    }

    fn executable_name(self) -> &'static str {
        match self {
            Self::Windows => "lua-language-server.exe",
            Self::Linux | Self::MacOs => "lua-language-server",
        }
    }
}

/// The bundled executable path for `platform` under `install_root`.
///
/// Prefers the flat `server/bin/` layout when the binary is present there,
/// falling back to the platform-named directory used by older server builds.
fn bundled_executable(install_root: &Path, platform: Platform) -> PathBuf {
    let bin = install_root.join(SERVER_DIR).join("bin");
    let direct = bin.join(platform.executable_name());
    if direct.is_file() {
        direct
    } else {
        bin.join(platform.fallback_dir())
            .join(platform.executable_name())
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Resolve the server command, first match wins:
/// a non-empty configured override (verbatim), else the bundled executable
/// for the current platform. No path exists for unrecognized platforms.
pub(crate) fn resolve_server_command(
    override_path: Option<&str>,
    install_root: &Path,
) -> Result<PathBuf, StartError> {
    if let Some(path) = override_path {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let platform = Platform::current().ok_or_else(|| {
        StartError::Configuration(
            "no bundled language server exists for this platform".to_string(),
        )
    })?;

    let executable = bundled_executable(install_root, platform);
    if !executable.is_file() {
        return Err(StartError::Configuration(format!(
            "language server executable not found at {}",
            executable.display()
        )));
    }

    mark_executable(&executable).map_err(|e| {
        StartError::Configuration(format!(
            "cannot mark {} executable: {e}",
            executable.display()
        ))
    })?;

    Ok(executable)
}
