use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirState {
    Missing,
    NotDirectory,
    Inaccessible,
    Usable,
}

/// Single inspection used everywhere a directory must be usable.
pub(crate) fn inspect_dir(path: &Path) -> DirState {
    let state = if !path.exists() {
        DirState::Missing
    } else if !path.is_dir() {
        DirState::NotDirectory
    } else if !access(path, Access::WriteSearch) {
        DirState::Inaccessible
    } else {
        DirState::Usable
    };
    debug!(path = %path.display(), ?state, "inspected directory");
    state
}

pub(crate) fn is_accessible_dir(path: &Path) -> bool {
    inspect_dir(path) == DirState::Usable
}

pub(crate) fn is_accessible_file(path: &Path) -> bool {
    path.is_file() && access(path, Access::Read)
}

pub(crate) fn is_executable_command(path: &Path) -> bool {
    let result = is_accessible_file(path) && access(path, Access::Execute);
    debug!(path = %path.display(), result, "is_executable_command");
    result
}

/// Restricts `path` to owner read/write/execute.
#[cfg(unix)]
pub(crate) fn set_owner_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .with_context(|| format!("changing permissions of {}", path.display()))
}

#[cfg(not(unix))]
pub(crate) fn set_owner_executable(path: &Path) -> Result<()> {
    let mut perms = std::fs::metadata(path)
        .with_context(|| format!("metadata for {}", path.display()))?
        .permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("changing permissions of {}", path.display()))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Read,
    Execute,
    WriteSearch,
}

#[cfg(unix)]
fn access(path: &Path, wanted: Access) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let mode = match wanted {
        Access::Read => libc::R_OK,
        Access::Execute => libc::X_OK,
        Access::WriteSearch => libc::W_OK | libc::X_OK,
    };
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}

#[cfg(not(unix))]
fn access(path: &Path, wanted: Access) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => match wanted {
            Access::Read | Access::Execute => true,
            Access::WriteSearch => !meta.permissions().readonly(),
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn inspect_dir_distinguishes_missing_and_files() {
        let temp = tempdir().unwrap();
        assert_eq!(inspect_dir(&temp.path().join("absent")), DirState::Missing);
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert_eq!(inspect_dir(&file), DirState::NotDirectory);
        assert_eq!(inspect_dir(temp.path()), DirState::Usable);
        assert!(is_accessible_dir(temp.path()));
    }

    #[cfg(unix)]
    #[test]
    fn owner_executable_sets_0o700() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let script = temp.path().join("activate");
        fs::write(&script, "# activate\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!is_executable_command(&script));

        set_owner_executable(&script).unwrap();
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        assert!(is_executable_command(&script));
    }

    #[test]
    fn directories_are_not_commands() {
        let temp = tempdir().unwrap();
        assert!(!is_accessible_file(temp.path()));
        assert!(!is_executable_command(temp.path()));
    }
}
