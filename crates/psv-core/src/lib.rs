#![deny(clippy::all, warnings)]

pub mod config;
pub mod effects;
pub mod errors;
mod fs;
pub mod logging;
pub mod paths;
pub mod pipeline;
mod probe;
pub mod process;
pub mod provision;
pub mod python_sys;

use anyhow::Result;

pub use crate::config::{
    Config, EnvSnapshot, Platform, ScriptInvocation, VenvRequest, WindowsShell, SENTINEL_ENV,
};
pub use crate::effects::{
    drive, drive_async, AsyncProcessRunner, ProcessRunner, SystemRunner, TokioRunner,
};
pub use crate::errors::VenvError;
pub use crate::pipeline::{Action, Session};
pub use crate::probe::{is_in_venv, is_in_venv_async};
pub use crate::process::{CommandSpec, RunOutput};
pub use crate::provision::EnvironmentLayout;

/// Provision the environment if needed, then re-run `request.script` inside it.
///
/// Returns the exit code of the last stage that ran.
///
/// # Errors
///
/// Returns [`VenvError`] values for unusable directories, a missing host
/// interpreter or a stage that could not be spawned.
pub fn execute(request: &VenvRequest) -> Result<i32> {
    let snapshot = EnvSnapshot::capture();
    let config = Config::from_snapshot(&snapshot);
    let runner = SystemRunner::new(config.max_capture_bytes());
    execute_with(request, &snapshot, &config, &runner)
}

/// [`execute`] on the tokio runtime; spawning and waiting yield to other tasks.
///
/// # Errors
///
/// Same as [`execute`].
pub async fn execute_async(request: &VenvRequest) -> Result<i32> {
    let snapshot = EnvSnapshot::capture();
    let config = Config::from_snapshot(&snapshot);
    let runner = TokioRunner::new(config.max_capture_bytes());
    execute_with_async(request, &snapshot, &config, &runner).await
}

/// # Errors
///
/// Same as [`execute`].
pub fn execute_with<R: ProcessRunner + ?Sized>(
    request: &VenvRequest,
    snapshot: &EnvSnapshot,
    config: &Config,
    runner: &R,
) -> Result<i32> {
    drive(Session::new(request, snapshot, config)?, runner)
}

/// # Errors
///
/// Same as [`execute`].
pub async fn execute_with_async<R: AsyncProcessRunner>(
    request: &VenvRequest,
    snapshot: &EnvSnapshot,
    config: &Config,
    runner: &R,
) -> Result<i32> {
    drive_async(Session::new(request, snapshot, config)?, runner).await
}

/// Where `request` would place its environment, without spawning anything.
///
/// # Errors
///
/// Returns path-resolution errors.
pub fn describe(
    request: &VenvRequest,
    snapshot: &EnvSnapshot,
    config: &Config,
) -> Result<EnvironmentLayout> {
    let session = Session::new(request, snapshot, config)?;
    Ok(EnvironmentLayout::new(
        session.venv_dir().to_path_buf(),
        config.platform(),
    ))
}
