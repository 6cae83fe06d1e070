//! Script materialization.
//!
//! Writes script text into the workspace, normalizing line endings, then
//! restricts the file to read+execute for owner and group and hands it to
//! the target identity.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;

use camino::Utf8Path;
use rustix::fs::{self as rfs, Mode, OFlags};
use tracing::{debug, error};

use crate::error::ScriptError;
use crate::identity::ResolvedIdentity;

/// Mode applied to the script file: read and execute for owner and group only.
pub const SCRIPT_MODE: u32 = 0o550;

/// Strips every carriage return from the script text.
///
/// Borrows the input when there is nothing to strip.
pub fn normalize_line_endings(content: &str) -> Cow<'_, str> {
    if content.contains('\r') {
        Cow::Owned(content.replace('\r', ""))
    } else {
        Cow::Borrowed(content)
    }
}

/// Writes `content` to a new file at `path` and prepares it for execution
/// as `identity`.
///
/// The file is created exclusively and symlinks are not followed, so an
/// existing entry at `path` is an error rather than something to overwrite.
///
/// # Errors
///
/// Returns `ScriptError::Io` carrying the OS error if the file cannot be
/// created, written, or have its mode and ownership changed.
pub fn write_script(
    path: &Utf8Path,
    content: &str,
    identity: &ResolvedIdentity,
) -> Result<(), ScriptError> {
    let normalized = normalize_line_endings(content);

    let fd = rfs::open(
        path.as_str(),
        OFlags::WRONLY | OFlags::CREATE | OFlags::EXCL | OFlags::NOFOLLOW | OFlags::CLOEXEC,
        Mode::RUSR | Mode::WUSR,
    )
    .map_err(|e| report(format!("failed to create script {}", path), std::io::Error::from(e)))?;
    let mut file = File::from(fd);

    file.write_all(normalized.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| report(format!("failed to write script {}", path), e))?;

    file.set_permissions(fs::Permissions::from_mode(SCRIPT_MODE))
        .map_err(|e| ScriptError::io(format!("failed to set permissions on {}", path), e))?;

    let (uid, gid) = identity.raw_ids();
    if !identity.is_unrestricted() {
        std::os::unix::fs::fchown(&file, uid, gid)
            .map_err(|e| ScriptError::io(format!("failed to change owner of {}", path), e))?;
    }

    debug!(%path, bytes = normalized.len(), ?uid, ?gid, "materialized script");
    Ok(())
}

/// Logs the OS error code alongside the failure before wrapping it.
fn report(context: String, source: std::io::Error) -> ScriptError {
    error!(
        error_code = source.raw_os_error().unwrap_or_default(),
        "{}: {}",
        context,
        source
    );
    ScriptError::io(context, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("path should be UTF-8");
        (dir, path)
    }

    #[test]
    fn normalize_strips_carriage_returns() {
        assert_eq!(normalize_line_endings("echo hi\r\n"), "echo hi\n");
        assert_eq!(normalize_line_endings("a\rb\r\nc"), "ab\nc");
    }

    #[test]
    fn normalize_borrows_clean_input() {
        assert!(matches!(normalize_line_endings("echo hi\n"), Cow::Borrowed(_)));
        assert!(matches!(normalize_line_endings(""), Cow::Borrowed("")));
    }

    #[test]
    fn write_script_normalizes_and_sets_mode() {
        let (_dir, root) = scratch();
        let path = root.join("temp_script.sh");

        write_script(&path, "echo hi\r\n", &ResolvedIdentity::unrestricted()).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"echo hi\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, SCRIPT_MODE);
    }

    #[test]
    fn write_script_accepts_empty_content() {
        let (_dir, root) = scratch();
        let path = root.join("temp_script.sh");

        write_script(&path, "", &ResolvedIdentity::unrestricted()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn write_script_refuses_existing_file() {
        let (_dir, root) = scratch();
        let path = root.join("temp_script.sh");
        fs::write(&path, "old").unwrap();

        let err = write_script(&path, "new", &ResolvedIdentity::unrestricted()).unwrap_err();
        match err {
            ScriptError::Io { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists);
            }
            other => panic!("expected Io error, got: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn write_script_refuses_symlink() {
        let (_dir, root) = scratch();
        let target = root.join("elsewhere");
        let path = root.join("temp_script.sh");
        std::os::unix::fs::symlink(&target, &path).unwrap();

        let result = write_script(&path, "echo hi\n", &ResolvedIdentity::unrestricted());
        assert!(result.is_err());
        assert!(!target.exists());
    }

    #[test]
    fn write_script_reports_missing_directory() {
        let (_dir, root) = scratch();
        let path = root.join("missing").join("temp_script.sh");

        let err = write_script(&path, "echo hi\n", &ResolvedIdentity::unrestricted()).unwrap_err();
        assert!(err.to_string().contains("failed to create script"));
        assert!(err.to_string().contains("not found"));
    }
}
