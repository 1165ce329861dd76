//! Write decoded secret content to a file with explicit ownership and mode
//!
//! The file is assembled in a `0600` temp file next to the destination,
//! chowned and chmodded there, then renamed into place.

use crate::error::{BwcacheError, BwcacheResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::ffi::CString;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Buffer size for getpwnam_r / getgrnam_r
const NSS_BUFFER_LEN: usize = 16 * 1024;

/// A file to write
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Base64-encoded content
    pub content_b64: String,
    pub dest: PathBuf,
    /// Octal mode such as "0600"
    pub mode: String,
    /// User name or uid; current user when unset
    pub owner: Option<String>,
    /// Group name or gid; current group when unset
    pub group: Option<String>,
    /// Report what would change without touching the file
    pub check: bool,
}

/// Content digest and ownership of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSnapshot {
    pub sha256: String,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: String,
}

/// Result of a write, comparable across runs
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub dest: PathBuf,
    pub changed: bool,
    pub check_mode: bool,
    pub before: Option<FileSnapshot>,
    pub after: FileSnapshot,
}

impl FileSnapshot {
    fn of_bytes(bytes: &[u8], uid: u32, gid: u32, mode: u32) -> Self {
        Self {
            sha256: hex::encode(Sha256::digest(bytes)),
            size: bytes.len() as u64,
            uid,
            gid,
            mode: format_mode(mode),
        }
    }

    /// Snapshot of an existing regular file, `None` when absent
    pub fn capture(path: &Path) -> BwcacheResult<Option<Self>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BwcacheError::io(format!("inspecting {}", path.display()), e)),
        };
        if !meta.is_file() {
            return Err(BwcacheError::DestinationNotFile(path.to_path_buf()));
        }

        let bytes =
            fs::read(path).map_err(|e| BwcacheError::io(format!("reading {}", path.display()), e))?;
        Ok(Some(Self::of_bytes(
            &bytes,
            meta.uid(),
            meta.gid(),
            meta.permissions().mode(),
        )))
    }
}

/// Validate a four-digit octal mode like "0755"
pub fn parse_mode(mode: &str) -> BwcacheResult<u32> {
    let valid = mode.len() == 4
        && mode.starts_with('0')
        && mode.chars().all(|c| ('0'..='7').contains(&c));
    if !valid {
        return Err(BwcacheError::InvalidMode(mode.to_string()));
    }
    u32::from_str_radix(mode, 8).map_err(|_| BwcacheError::InvalidMode(mode.to_string()))
}

/// Write `request.content_b64` to `request.dest`
pub fn write_file(request: &WriteRequest) -> BwcacheResult<WriteOutcome> {
    let mode = parse_mode(&request.mode)?;
    let bytes = STANDARD
        .decode(request.content_b64.trim())
        .map_err(|e| BwcacheError::InvalidContent(e.to_string()))?;
    let uid = match &request.owner {
        Some(owner) => resolve_user(owner)?,
        None => current_uid(),
    };
    let gid = match &request.group {
        Some(group) => resolve_group(group)?,
        None => current_gid(),
    };

    // Write through symlinks rather than replacing them
    let target = fs::canonicalize(&request.dest).unwrap_or_else(|_| request.dest.clone());
    let before = FileSnapshot::capture(&target)?;
    let intended = FileSnapshot::of_bytes(&bytes, uid, gid, mode);

    if request.check {
        return Ok(WriteOutcome {
            dest: request.dest.clone(),
            changed: before.as_ref() != Some(&intended),
            check_mode: true,
            before,
            after: intended,
        });
    }

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut staged = tempfile::Builder::new()
        .prefix(".bwcache.")
        .tempfile_in(&parent)
        .map_err(|e| BwcacheError::io(format!("creating temp file in {}", parent.display()), e))?;

    staged
        .write_all(&bytes)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| BwcacheError::io(format!("writing temp file for {}", target.display()), e))?;
    std::os::unix::fs::chown(staged.path(), Some(uid), Some(gid)).map_err(|e| {
        BwcacheError::io(format!("changing owner of {} to {}:{}", target.display(), uid, gid), e)
    })?;
    fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode))
        .map_err(|e| BwcacheError::io(format!("setting mode {} on {}", request.mode, target.display()), e))?;
    staged
        .persist(&target)
        .map_err(|e| BwcacheError::io(format!("replacing {}", target.display()), e.error))?;

    let after = FileSnapshot::capture(&target)?.ok_or_else(|| {
        BwcacheError::Internal(format!("{} vanished after write", target.display()))
    })?;
    let changed = before.as_ref() != Some(&after);
    debug!("Wrote {} (changed: {})", target.display(), changed);

    Ok(WriteOutcome {
        dest: request.dest.clone(),
        changed,
        check_mode: false,
        before,
        after,
    })
}

/// Resolve a user name (or numeric uid) to a uid
pub fn resolve_user(name: &str) -> BwcacheResult<u32> {
    if let Ok(uid) = name.parse::<u32>() {
        return Ok(uid);
    }
    let c_name = CString::new(name).map_err(|_| BwcacheError::UnknownUser(name.to_string()))?;
    let mut buf = vec![0 as libc::c_char; NSS_BUFFER_LEN];
    // SAFETY: passwd is plain old data and may start zeroed
    let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: every pointer refers to a live buffer of the stated length for the whole call
    let rc = unsafe {
        libc::getpwnam_r(
            c_name.as_ptr(),
            &mut entry,
            buf.as_mut_ptr(),
            buf.len(),
            &mut found,
        )
    };
    if rc != 0 || found.is_null() {
        return Err(BwcacheError::UnknownUser(name.to_string()));
    }
    Ok(entry.pw_uid)
}

/// Resolve a group name (or numeric gid) to a gid
pub fn resolve_group(name: &str) -> BwcacheResult<u32> {
    if let Ok(gid) = name.parse::<u32>() {
        return Ok(gid);
    }
    let c_name = CString::new(name).map_err(|_| BwcacheError::UnknownGroup(name.to_string()))?;
    let mut buf = vec![0 as libc::c_char; NSS_BUFFER_LEN];
    // SAFETY: group is plain old data and may start zeroed
    let mut entry: libc::group = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::group = std::ptr::null_mut();

    // SAFETY: every pointer refers to a live buffer of the stated length for the whole call
    let rc = unsafe {
        libc::getgrnam_r(
            c_name.as_ptr(),
            &mut entry,
            buf.as_mut_ptr(),
            buf.len(),
            &mut found,
        )
    };
    if rc != 0 || found.is_null() {
        return Err(BwcacheError::UnknownGroup(name.to_string()));
    }
    Ok(entry.gr_gid)
}

fn current_uid() -> u32 {
    // SAFETY: getuid cannot fail
    unsafe { libc::getuid() }
}

fn current_gid() -> u32 {
    // SAFETY: getgid cannot fail
    unsafe { libc::getgid() }
}

fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}
