//! Response file creation.
//!
//! `FileCreator` writes a generated response document somewhere the
//! installer user can read it and returns the path. `TempFileCreator` is the
//! default: a uniquely named, persisted file in the temp directory, mode
//! 0640, owned by the installer user and group when running as root.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{chown, Gid, Group, Uid, User};
use tracing::{debug, warn};

/// Prefix of generated response files; the install name is appended
pub const RESPONSE_FILE_PREFIX: &str = "ibm-installation-manager-responsefile-for-";

const RESPONSE_FILE_MODE: u32 = 0o640;

/// What to write and who should own it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRequest {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub content: String,
    /// Do not keep a `.bak` copy of a file being replaced
    pub skip_backup: bool,
    /// Fixed destination; `None` picks a fresh temporary file
    pub path: Option<PathBuf>,
    /// File name prefix for temporary files
    pub prefix: String,
}

impl FileRequest {
    /// Request for the generated response file of install `name`.
    pub fn response_file(
        name: &str,
        content: String,
        owner: Option<String>,
        group: Option<String>,
    ) -> Self {
        Self {
            owner,
            group,
            content,
            skip_backup: true,
            path: None,
            prefix: format!("{}{}", RESPONSE_FILE_PREFIX, name),
        }
    }
}

pub trait FileCreator {
    /// Create the file and return its path.
    fn create(&self, request: &FileRequest) -> io::Result<PathBuf>;

    /// Delete a file previously returned by `create`.
    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Creates files under the system (or a chosen) temp directory.
#[derive(Debug, Clone, Default)]
pub struct TempFileCreator {
    dir: Option<PathBuf>,
}

impl TempFileCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create temporary files in `dir` instead of the system temp directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    fn write_temp(&self, request: &FileRequest) -> io::Result<PathBuf> {
        let dir = self.dir.clone().unwrap_or_else(std::env::temp_dir);
        let mut file = tempfile::Builder::new()
            .prefix(&request.prefix)
            .suffix(".xml")
            .tempfile_in(dir)?;
        file.write_all(request.content.as_bytes())?;
        file.as_file().sync_all()?;

        // persist past this process; the installer reads it after we return
        let (_, path) = file.keep().map_err(io::Error::from)?;
        Ok(path)
    }

    fn write_fixed(path: &Path, request: &FileRequest) -> io::Result<PathBuf> {
        if path.is_file() && !request.skip_backup {
            let mut backup = OsString::from(path.as_os_str());
            backup.push(".bak");
            fs::copy(path, &backup)?;
            debug!("Backed up {:?} to {:?}", path, backup);
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(RESPONSE_FILE_MODE)
            .open(path)?;
        file.write_all(request.content.as_bytes())?;
        file.sync_all()?;
        Ok(path.to_path_buf())
    }
}

impl FileCreator for TempFileCreator {
    fn create(&self, request: &FileRequest) -> io::Result<PathBuf> {
        let path = match &request.path {
            Some(path) => Self::write_fixed(path, request)?,
            None => self.write_temp(request)?,
        };

        fs::set_permissions(&path, fs::Permissions::from_mode(RESPONSE_FILE_MODE))?;
        apply_ownership(&path, request.owner.as_deref(), request.group.as_deref())?;

        debug!(
            "Wrote {} byte(s) to {:?} (owner={:?}, group={:?})",
            request.content.len(),
            path,
            request.owner,
            request.group
        );
        Ok(path)
    }
}

/// chown to the requested owner/group. Only root can give files away, so
/// other callers keep ownership and get a warning.
fn apply_ownership(path: &Path, owner: Option<&str>, group: Option<&str>) -> io::Result<()> {
    if owner.is_none() && group.is_none() {
        return Ok(());
    }
    if !Uid::effective().is_root() {
        warn!(
            "Not running as root; leaving {:?} owned by the current user",
            path
        );
        return Ok(());
    }

    let uid = match owner {
        Some(name) => Some(lookup_user(name)?),
        None => None,
    };
    let gid = match group {
        Some(name) => Some(lookup_group(name)?),
        None => None,
    };
    chown(path, uid, gid).map_err(io::Error::from)
}

fn lookup_user(name: &str) -> io::Result<Uid> {
    User::from_name(name)
        .map_err(io::Error::from)?
        .map(|u| u.uid)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown user '{}'", name)))
}

fn lookup_group(name: &str) -> io::Result<Gid> {
    Group::from_name(name)
        .map_err(io::Error::from)?
        .map(|g| g.gid)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown group '{}'", name)))
}
