use std::future::Future;
use std::io;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::errors::VenvError;
use crate::pipeline::{Action, Session};
use crate::process::{append_limited, exit_code, run_command, CommandSpec, RunOutput};

pub trait ProcessRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput>;
}

pub trait AsyncProcessRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> impl Future<Output = Result<RunOutput>> + Send;
}

/// Runs children on OS threads and blocks until they exit.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    limit: usize,
}

impl SystemRunner {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput> {
        debug!(command = ?spec.argv(), cwd = %spec.cwd.display(), "spawning {}", spec.label);
        run_command(spec, self.limit)
    }
}

/// Runs children through `tokio::process`; waiting yields to the runtime.
#[derive(Debug, Clone, Copy)]
pub struct TokioRunner {
    limit: usize,
}

impl TokioRunner {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl AsyncProcessRunner for TokioRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<RunOutput> {
        debug!(command = ?spec.argv(), cwd = %spec.cwd.display(), "spawning {}", spec.label);
        let program = spec.program.as_str();
        let mut child = tokio::process::Command::new(program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VenvError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin missing for {program}"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout missing for {program}"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr missing for {program}"))?;

        let (fed, out, err) = tokio::join!(
            feed_stdin(stdin, &spec.stdin),
            read_limited(stdout, self.limit),
            read_limited(stderr, self.limit),
        );
        fed?;
        let (stdout, stdout_truncated) = out?;
        let (stderr, stderr_truncated) = err?;
        let status = child
            .wait()
            .await
            .with_context(|| format!("failed to wait for {program}"))?;

        Ok(RunOutput {
            code: exit_code(status),
            stdout,
            stderr,
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

async fn feed_stdin(mut stdin: impl AsyncWrite + Unpin, input: &[u8]) -> Result<()> {
    let written = match stdin.write_all(input).await {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    };
    written.context("writing child stdin")?;
    // dropping the handle closes the pipe so the child sees EOF
    drop(stdin);
    Ok(())
}

async fn read_limited(mut reader: impl AsyncRead + Unpin, limit: usize) -> Result<(Vec<u8>, bool)> {
    let mut buffer = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        append_limited(&mut buffer, &chunk[..read], limit, &mut truncated);
    }
    Ok((buffer, truncated))
}

/// Drives a session to completion with blocking process execution.
///
/// # Errors
///
/// Returns provisioning errors and failures to spawn a stage.
pub fn drive<R: ProcessRunner + ?Sized>(mut session: Session, runner: &R) -> Result<i32> {
    let mut completed = None;
    loop {
        match session.advance(completed.take())? {
            Action::Run(spec) => {
                debug!(phase = ?session.phase(), "running {}", spec.label);
                completed = Some(runner.run(&spec)?);
            }
            Action::Exit(code) => return Ok(code),
        }
    }
}

/// Async counterpart of [`drive`].
///
/// # Errors
///
/// Same as [`drive`].
pub async fn drive_async<R: AsyncProcessRunner>(mut session: Session, runner: &R) -> Result<i32> {
    let mut completed = None;
    loop {
        match session.advance(completed.take())? {
            Action::Run(spec) => {
                debug!(phase = ?session.phase(), "running {}", spec.label);
                completed = Some(runner.run(&spec).await?);
            }
            Action::Exit(code) => return Ok(code),
        }
    }
}
