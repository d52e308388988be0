use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::{EnvSnapshot, APP_NAME, DEFAULT_ENV_NAME, LOCAL_PROJECT_DIR, OVERRIDE_ENV};
use crate::errors::VenvError;
use crate::fs::{inspect_dir, is_accessible_dir, DirState};

/// Parent directory holding every named environment.
///
/// `$XDG_DATA_HOME/pyshell_venv` wins only when it already exists and is usable;
/// otherwise `<home>/.local/share/pyshell_venv` is used and created on demand.
///
/// # Errors
///
/// Returns [`VenvError::CenterNotDirectory`] or [`VenvError::CenterNotAccessible`]
/// when the home fallback is occupied or unusable, and
/// [`VenvError::HomeDirectoryUnavailable`] when there is no home to fall back to.
pub fn resolve_center_dir(snapshot: &EnvSnapshot, home: Option<&Path>) -> Result<PathBuf> {
    if let Some(base) = snapshot.var(OVERRIDE_ENV).filter(|value| !value.is_empty()) {
        debug!(%base, "override base directory is set");
        let candidate = Path::new(base).join(APP_NAME);
        if candidate.exists() && is_accessible_dir(&candidate) {
            debug!(center = %candidate.display(), "using override center directory");
            return Ok(candidate);
        }
        debug!(candidate = %candidate.display(), "override center directory unusable; falling back");
    }

    let home = home.ok_or(VenvError::HomeDirectoryUnavailable)?;
    let center = home.join(".local").join("share").join(APP_NAME);
    match inspect_dir(&center) {
        DirState::Missing => {
            std::fs::create_dir_all(&center)
                .with_context(|| format!("creating {}", center.display()))?;
            debug!(center = %center.display(), "created default center directory");
            Ok(center)
        }
        DirState::NotDirectory => Err(VenvError::CenterNotDirectory { path: center }.into()),
        DirState::Inaccessible => Err(VenvError::CenterNotAccessible { path: center }.into()),
        DirState::Usable => Ok(center),
    }
}

/// Directory that is, or will become, the isolated environment.
///
/// # Errors
///
/// Propagates [`resolve_center_dir`] failures outside local-project mode.
pub fn resolve_venv_dir(
    env_name: &str,
    local_project: bool,
    work_dir: &Path,
    snapshot: &EnvSnapshot,
    home: Option<&Path>,
) -> Result<PathBuf> {
    if local_project {
        return Ok(work_dir.join(LOCAL_PROJECT_DIR));
    }
    let name = if env_name.is_empty() {
        DEFAULT_ENV_NAME
    } else {
        env_name
    };
    Ok(resolve_center_dir(snapshot, home)?.join(name))
}
