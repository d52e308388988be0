use std::path::Path;

use crate::config::Platform;
use crate::process::CommandSpec;

/// Base interpreter commands tried, in priority order, when a new environment is needed.
pub const HOST_PYTHON_CANDIDATES: [&str; 3] = ["python3", "python", "py"];

/// Asks the platform shell whether `candidate` resolves to a command.
///
/// Exit code 0 means found.
#[must_use]
pub fn lookup_command(candidate: &str, platform: Platform, cwd: &Path) -> CommandSpec {
    let (program, args) = match platform {
        Platform::Posix => (
            "sh",
            vec!["-c".to_string(), format!("command -v {candidate}")],
        ),
        Platform::Windows(_) => (
            "cmd.exe",
            vec!["/C".to_string(), "where".to_string(), candidate.to_string()],
        ),
    };
    CommandSpec::new(format!("lookup {candidate}"), program, args).cwd(cwd)
}

/// `<host> -m venv <dir>`.
#[must_use]
pub fn venv_create_command(host: &str, venv_dir: &Path, cwd: &Path) -> CommandSpec {
    CommandSpec::new(
        "venv create",
        host,
        vec![
            "-m".to_string(),
            "venv".to_string(),
            venv_dir.to_string_lossy().into_owned(),
        ],
    )
    .cwd(cwd)
}
