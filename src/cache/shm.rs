//! Memory-backed directory selection
//!
//! Secrets cached by bwcache must not land on durable storage. Each supported
//! platform maps to a RAM-backed mount point; adding a platform means adding a
//! row to [`SHARED_DIRECTORIES`].

use crate::error::{BwcacheError, BwcacheResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Expected memory-backed mount point for one platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedDirectory {
    /// Platform identifier as reported by `std::env::consts::OS`
    pub platform: &'static str,
    /// Mount point, `~` expands to the home directory
    pub path: &'static str,
    /// Shown when the mount point is absent
    pub remedy: &'static str,
}

/// Known platforms and their memory-backed directories
pub const SHARED_DIRECTORIES: &[SharedDirectory] = &[
    SharedDirectory {
        platform: "linux",
        path: "/dev/shm",
        remedy: "Mount a tmpfs at /dev/shm.",
    },
    SharedDirectory {
        platform: "macos",
        path: "~/.tmpdisk/shm",
        remedy: "Create it with tmpdisk (https://github.com/imothee/tmpdisk).",
    },
];

/// Resolve the memory-backed directory for the current platform
pub fn resolve_shared_directory() -> BwcacheResult<PathBuf> {
    resolve_shared_directory_in(
        std::env::consts::OS,
        SHARED_DIRECTORIES,
        dirs::home_dir().as_deref(),
    )
}

/// Resolve `platform` against `table`, expanding `~` with `home`
pub fn resolve_shared_directory_in(
    platform: &str,
    table: &[SharedDirectory],
    home: Option<&Path>,
) -> BwcacheResult<PathBuf> {
    let entry = table
        .iter()
        .find(|entry| entry.platform == platform)
        .ok_or_else(|| BwcacheError::UnsupportedPlatform {
            platform: platform.to_string(),
            supported: table
                .iter()
                .map(|entry| entry.platform)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let path = expand_home(entry.path, home)?;
    if !path.is_dir() {
        return Err(BwcacheError::SharedDirectoryMissing {
            path,
            remedy: entry.remedy.to_string(),
        });
    }

    debug!("Using shared directory {}", path.display());
    Ok(path)
}

fn expand_home(path: &str, home: Option<&Path>) -> BwcacheResult<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => home
            .map(|home| home.join(rest))
            .ok_or_else(|| BwcacheError::User(format!("Cannot expand {}: no home directory", path))),
        None if path == "~" => home
            .map(Path::to_path_buf)
            .ok_or_else(|| BwcacheError::User("Cannot expand ~: no home directory".to_string())),
        None => Ok(PathBuf::from(path)),
    }
}
