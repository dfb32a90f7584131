//! Atomic writes of rendered configuration files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{chown, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Group, User};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CharmError;

/// Destination and ownership of a rendered file.
#[derive(Debug, Clone)]
pub struct FileSpec {
    pub path: PathBuf,
    pub mode: u32,
    /// Owner user name; `None` leaves ownership untouched.
    pub owner: Option<String>,
    /// Owner group name; `None` leaves ownership untouched.
    pub group: Option<String>,
}

/// Write `content` to `spec.path` unless the file already holds it.
///
/// Returns whether the file content changed. The new content is written to a
/// uniquely named temporary file next to the target, permissions and
/// ownership are applied, and the file is renamed into place. An unchanged
/// file still gets its mode and ownership applied again.
pub fn write_if_changed(spec: &FileSpec, content: &str) -> Result<bool, CharmError> {
    let path = &spec.path;

    if let Ok(existing) = fs::read_to_string(path) {
        if existing == content {
            debug!(path = %path.display(), "Rendered file unchanged");
            apply_permissions(path, spec)?;
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(temp_name);

    let result = write_temp(&temp_path, spec, content).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| CharmError::Template {
            message: format!("Failed to move rendered file into {}: {}", path.display(), e),
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    info!(
        path = %path.display(),
        bytes = content.len(),
        mode = format!("{:o}", spec.mode),
        "Rendered file written"
    );

    Ok(true)
}

fn write_temp(temp_path: &Path, spec: &FileSpec, content: &str) -> Result<(), CharmError> {
    // create_new() gives O_EXCL semantics for the temporary name
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    apply_permissions(temp_path, spec)
}

/// Set the mode and, when configured, the owner and group of `path`.
fn apply_permissions(path: &Path, spec: &FileSpec) -> Result<(), CharmError> {
    fs::set_permissions(path, fs::Permissions::from_mode(spec.mode))?;

    let uid = spec.owner.as_deref().map(resolve_user).transpose()?;
    let gid = spec.group.as_deref().map(resolve_group).transpose()?;
    if uid.is_some() || gid.is_some() {
        chown(path, uid, gid)?;
    }

    Ok(())
}

fn resolve_user(name: &str) -> Result<u32, CharmError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(CharmError::Config {
            message: format!("Unknown user '{}'", name),
        }),
        Err(e) => Err(CharmError::Config {
            message: format!("Failed to look up user '{}': {}", name, e),
        }),
    }
}

fn resolve_group(name: &str) -> Result<u32, CharmError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(CharmError::Config {
            message: format!("Unknown group '{}'", name),
        }),
        Err(e) => Err(CharmError::Config {
            message: format!("Failed to look up group '{}': {}", name, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dir: &Path) -> FileSpec {
        FileSpec {
            path: dir.join("etc/default/cadvisor"),
            mode: 0o640,
            owner: None,
            group: None,
        }
    }

    #[test]
    fn test_first_write_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec(dir.path());

        assert!(write_if_changed(&spec, "CADVISOR_PORT=\"9103\"\n").unwrap());
        assert_eq!(fs::read_to_string(&spec.path).unwrap(), "CADVISOR_PORT=\"9103\"\n");

        let mode = fs::metadata(&spec.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_identical_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec(dir.path());

        assert!(write_if_changed(&spec, "a").unwrap());
        assert!(!write_if_changed(&spec, "a").unwrap());
        assert!(write_if_changed(&spec, "b").unwrap());
    }

    #[test]
    fn test_unchanged_content_restores_mode() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec(dir.path());
        write_if_changed(&spec, "a").unwrap();
        fs::set_permissions(&spec.path, fs::Permissions::from_mode(0o666)).unwrap();

        assert!(!write_if_changed(&spec, "a").unwrap());
        let mode = fs::metadata(&spec.path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec(dir.path());
        write_if_changed(&spec, "content").unwrap();

        let entries: Vec<_> = fs::read_dir(spec.path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_unknown_owner_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = spec(dir.path());
        spec.owner = Some("no-such-user-cadvisor-test".to_string());
        assert!(write_if_changed(&spec, "content").is_err());
        assert!(!spec.path.exists());
    }
}
