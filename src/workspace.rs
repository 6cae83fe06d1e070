//! Per-invocation temporary workspace.
//!
//! Each invocation gets a fresh, uniquely named directory that holds exactly
//! one generated script. The directory is removed when the invocation ends,
//! either explicitly through [`Workspace::destroy`] or, on early-return
//! paths, by the `Drop` guard.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use tracing::debug;

use crate::error::ScriptError;
use crate::identity::ResolvedIdentity;

/// File name of the materialized script inside the workspace.
pub const SCRIPT_FILE_NAME: &str = "temp_script.sh";

/// Mode applied to the sealed workspace directory: read and search for owner
/// and group only.
pub const WORKSPACE_MODE: u32 = 0o550;

const WORKSPACE_PREFIX: &str = "rsnxscript-";

/// An exclusively owned temporary directory scoped to one invocation.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: Utf8PathBuf,
}

impl Workspace {
    /// Creates a new workspace under `temp_root` (or the system temp
    /// directory) and hands its ownership to the resolved identity.
    ///
    /// The directory stays owner-writable until [`seal`](Self::seal) so the
    /// script can be written into it by an unprivileged caller.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the directory cannot be created or its
    /// ownership cannot be changed.
    pub fn create(
        identity: &ResolvedIdentity,
        temp_root: Option<&Utf8Path>,
    ) -> Result<Self, ScriptError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| ScriptError::io("failed to create temporary workspace", e))?;

        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).map_err(|p| {
            ScriptError::io(
                format!("temporary workspace path is not valid UTF-8: {}", p.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidData),
            )
        })?;

        // From here on the guard owns the directory, so failures below still clean up.
        let workspace = Self {
            dir: Some(dir),
            path,
        };

        let (uid, gid) = identity.raw_ids();
        if !identity.is_unrestricted() {
            std::os::unix::fs::chown(&workspace.path, uid, gid).map_err(|e| {
                ScriptError::io(format!("failed to change owner of {}", workspace.path), e)
            })?;
        }

        debug!(path = %workspace.path, ?uid, ?gid, "created workspace");
        Ok(workspace)
    }

    /// Returns the workspace directory.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the path of `name` inside the workspace.
    pub fn path_for(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    /// Returns the path of the script file.
    pub fn script_path(&self) -> Utf8PathBuf {
        self.path_for(SCRIPT_FILE_NAME)
    }

    /// Drops the write bit from the directory once its content is in place.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the mode cannot be changed.
    pub fn seal(&self) -> Result<(), ScriptError> {
        set_dir_mode(&self.path, WORKSPACE_MODE)
    }

    /// Removes the workspace and everything in it.
    ///
    /// # Errors
    ///
    /// Returns `ScriptError::Io` if the tree cannot be removed.
    pub fn destroy(mut self) -> Result<(), ScriptError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), ScriptError> {
        if self.dir.is_none() {
            return Ok(());
        }
        // Directories without the write bit (the sealed root, or ones the
        // script created read-only) would block removing their entries.
        restore_owner_write(self.path.as_std_path());
        fs::remove_dir_all(&self.path)
            .map_err(|e| ScriptError::io(format!("failed to remove workspace {}", self.path), e))?;
        // Only disarm the guard once the tree is gone, so a failed removal is retried on drop.
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        debug!(path = %self.path, "removed workspace");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::error!(path = %self.path, "failed to cleanup workspace: {}", e);
        }
    }
}

fn set_dir_mode(path: &Utf8Path, mode: u32) -> Result<(), ScriptError> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| ScriptError::io(format!("failed to set permissions on {}", path), e))
}

/// Adds owner rwx to `dir` and every directory below it, without following
/// symlinks. Failures are left for the removal to report.
fn restore_owner_write(dir: &Path) {
    let Ok(metadata) = fs::symlink_metadata(dir) else {
        return;
    };
    if !metadata.is_dir() {
        return;
    }
    let mode = metadata.permissions().mode() & 0o7777;
    if mode & 0o700 != 0o700
        && let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o700))
    {
        debug!(path = %dir.display(), "failed to restore write permission: {}", e);
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            restore_owner_write(&entry.path());
        }
    }
}
