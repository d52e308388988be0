use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::config::{Platform, WindowsShell};
use crate::errors::VenvError;
use crate::fs::{inspect_dir, is_executable_command, set_owner_executable, DirState};

/// Interpreter inside the environment. Not checked for existence.
#[must_use]
pub fn venv_python_path(venv_dir: &Path, platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows(_) => venv_dir.join("Scripts").join("python.exe"),
        Platform::Posix => venv_dir.join("bin").join("python3"),
    }
}

#[must_use]
pub fn activation_script_path(venv_dir: &Path, platform: Platform) -> PathBuf {
    match platform {
        Platform::Windows(WindowsShell::Cmd) => venv_dir.join("Scripts").join("activate.bat"),
        Platform::Windows(WindowsShell::PowerShell) => {
            venv_dir.join("Scripts").join("activate.ps1")
        }
        Platform::Posix => venv_dir.join("bin").join("activate"),
    }
}

/// Program and arguments that run the activation script.
#[must_use]
pub fn activation_command(script: &Path, platform: Platform) -> (String, Vec<String>) {
    let script = script.to_string_lossy().into_owned();
    match platform {
        Platform::Posix => ("sh".to_string(), vec![script]),
        Platform::Windows(WindowsShell::Cmd) => ("cmd.exe".to_string(), vec!["/C".to_string(), script]),
        Platform::Windows(WindowsShell::PowerShell) => (
            "powershell.exe".to_string(),
            vec![
                "-NoProfile".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-File".to_string(),
                script,
            ],
        ),
    }
}

/// Validates an existing environment and returns its activation command.
///
/// The activation script gets mode `0o700` when it is not already executable.
///
/// # Errors
///
/// [`VenvError::NotADirectory`] / [`VenvError::NotAccessible`] when the
/// environment path is unusable, [`VenvError::ActivationNotFound`] when the
/// activation script is missing, or an I/O error if permissions cannot be fixed.
pub fn prepare_activation(venv_dir: &Path, platform: Platform) -> Result<(String, Vec<String>)> {
    match inspect_dir(venv_dir) {
        DirState::Missing | DirState::NotDirectory => {
            return Err(VenvError::NotADirectory {
                path: venv_dir.to_path_buf(),
            }
            .into())
        }
        DirState::Inaccessible => {
            return Err(VenvError::NotAccessible {
                path: venv_dir.to_path_buf(),
            }
            .into())
        }
        DirState::Usable => {}
    }

    let script = activation_script_path(venv_dir, platform);
    debug!(path = %script.display(), "activation script");
    if !script.exists() {
        return Err(VenvError::ActivationNotFound { path: script }.into());
    }
    if is_executable_command(&script) {
        debug!("venv activate command is accessible");
    } else {
        debug!("venv activate command is not executable; changing permission to 0o700");
        set_owner_executable(&script)?;
    }

    let command = activation_command(&script, platform);
    debug!(?command, "activate command");
    Ok(command)
}

/// Where an environment lives and what it contains, for inspection commands.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentLayout {
    pub venv_dir: PathBuf,
    pub python: PathBuf,
    pub activate: PathBuf,
    pub exists: bool,
    pub platform: Platform,
}

impl EnvironmentLayout {
    #[must_use]
    pub fn new(venv_dir: PathBuf, platform: Platform) -> Self {
        Self {
            python: venv_python_path(&venv_dir, platform),
            activate: activation_script_path(&venv_dir, platform),
            exists: venv_dir.is_dir(),
            venv_dir,
            platform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const POWERSHELL: Platform = Platform::Windows(WindowsShell::PowerShell);
    const CMD: Platform = Platform::Windows(WindowsShell::Cmd);

    #[test]
    fn posix_layout() {
        let dir = Path::new("/envs/default");
        assert_eq!(
            venv_python_path(dir, Platform::Posix),
            PathBuf::from("/envs/default/bin/python3")
        );
        assert_eq!(
            activation_script_path(dir, Platform::Posix),
            PathBuf::from("/envs/default/bin/activate")
        );
    }

    #[test]
    fn windows_layout_prefers_powershell() {
        let dir = Path::new("envs");
        assert_eq!(
            venv_python_path(dir, POWERSHELL),
            dir.join("Scripts").join("python.exe")
        );
        assert_eq!(
            activation_script_path(dir, POWERSHELL),
            dir.join("Scripts").join("activate.ps1")
        );
        assert_eq!(
            activation_script_path(dir, CMD),
            dir.join("Scripts").join("activate.bat")
        );
    }

    #[test]
    fn activation_commands_per_shell() {
        let script = Path::new("act");
        assert_eq!(
            activation_command(script, Platform::Posix),
            ("sh".to_string(), vec!["act".to_string()])
        );
        assert_eq!(activation_command(script, CMD).0, "cmd.exe");
        let (program, args) = activation_command(script, POWERSHELL);
        assert_eq!(program, "powershell.exe");
        assert_eq!(args.last().map(String::as_str), Some("act"));
    }

    #[test]
    fn file_in_place_of_env_is_not_a_directory() {
        let temp = tempdir().unwrap();
        let env = temp.path().join("env");
        fs::write(&env, "oops").unwrap();
        let err = prepare_activation(&env, Platform::Posix).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VenvError>(),
            Some(VenvError::NotADirectory { .. })
        ));
    }

    #[test]
    fn missing_activation_script_is_reported() {
        let temp = tempdir().unwrap();
        let err = prepare_activation(temp.path(), Platform::Posix).unwrap_err();
        match err.downcast_ref::<VenvError>() {
            Some(VenvError::ActivationNotFound { path }) => {
                assert_eq!(path, &temp.path().join("bin/activate"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_activation_is_forced_to_0o700() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let script = bin.join("activate");
        fs::write(&script, "# activate\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();

        let (program, args) = prepare_activation(temp.path(), Platform::Posix).unwrap();
        assert_eq!(program, "sh");
        assert_eq!(args, vec![script.to_string_lossy().into_owned()]);
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn executable_activation_keeps_its_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let script = bin.join("activate");
        fs::write(&script, "# activate\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        prepare_activation(temp.path(), Platform::Posix).unwrap();
        let mode = fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn layout_reports_existence() {
        let temp = tempdir().unwrap();
        let layout = EnvironmentLayout::new(temp.path().join("absent"), Platform::Posix);
        assert!(!layout.exists);
        let layout = EnvironmentLayout::new(temp.path().to_path_buf(), Platform::Posix);
        assert!(layout.exists);
        assert_eq!(layout.python, temp.path().join("bin/python3"));
    }
}
