//! The relaunch protocol as a state machine.
//!
//! A [`Session`] never spawns anything itself. It hands out [`Action::Run`]
//! requests and expects the matching [`RunOutput`] back on the next call to
//! [`Session::advance`]. The blocking and tokio drivers in [`crate::effects`] feed
//! it, so both execution models share one implementation of the protocol.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};

use crate::config::{Config, EnvSnapshot, Platform, ScriptInvocation, VenvRequest};
use crate::errors::VenvError;
use crate::paths::resolve_venv_dir;
use crate::probe::mark_in_venv;
use crate::process::{CommandSpec, RunOutput};
use crate::provision::{prepare_activation, venv_python_path};
use crate::python_sys::{lookup_command, venv_create_command, HOST_PYTHON_CANDIDATES};

pub const STAGE_ACTIVATE: &str = "activate";
pub const STAGE_INSTALL: &str = "pip install";
pub const STAGE_PYTHON: &str = "python";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Run(CommandSpec),
    Exit(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    LocatingInterpreter { candidate: usize },
    CreatingEnvironment,
    Activating,
    Installing,
    Executing,
    Finished(i32),
}

/// Outcome of one pipeline stage, logged and then dropped.
#[derive(Debug)]
pub struct StageReport<'a> {
    pub stage: &'a str,
    pub code: i32,
    pub stdout: &'a [u8],
    pub stderr: &'a [u8],
    pub truncated: bool,
}

impl<'a> StageReport<'a> {
    #[must_use]
    pub fn new(stage: &'a str, output: &'a RunOutput) -> Self {
        Self {
            stage,
            code: output.code,
            stdout: &output.stdout,
            stderr: &output.stderr,
            truncated: output.truncated,
        }
    }

    pub fn log(&self) {
        if !self.stdout.is_empty() {
            info!("{} output: {}", self.stage, String::from_utf8_lossy(self.stdout));
        }
        if !self.stderr.is_empty() {
            error!("{} error: {}", self.stage, String::from_utf8_lossy(self.stderr));
        }
        if self.truncated {
            warn!(stage = self.stage, "captured output exceeded the capture limit and was truncated");
        }
        if self.code != 0 {
            error!(code = self.code, "{} command failed", self.stage);
        }
    }
}

#[derive(Debug)]
pub struct Session {
    venv_dir: PathBuf,
    work_dir: PathBuf,
    platform: Platform,
    package_text: String,
    script: ScriptInvocation,
    phase: Phase,
}

impl Session {
    /// Resolves where the environment lives. Nothing is spawned yet.
    ///
    /// # Errors
    ///
    /// Returns path-resolution errors (see [`resolve_venv_dir`]).
    pub fn new(request: &VenvRequest, snapshot: &EnvSnapshot, config: &Config) -> Result<Self> {
        debug!(script = %request.script.script, args = ?request.script.args, "relaunch target");
        debug!(env_name = %request.env_name, local_project = request.local_project, "environment selection");
        debug!(install_package_text = %request.require_package_text, "packages");

        let work_dir = request.resolved_work_dir()?;
        debug!(work_directory = %work_dir.display(), "work directory");
        let venv_dir = resolve_venv_dir(
            &request.env_name,
            request.local_project,
            &work_dir,
            snapshot,
            config.home().map(PathBuf::as_path),
        )?;
        debug!(venv_dir = %venv_dir.display(), "venv directory");

        Ok(Self {
            venv_dir,
            work_dir,
            platform: config.platform(),
            package_text: request.require_package_text.clone(),
            script: request.script.clone(),
            phase: Phase::Start,
        })
    }

    #[must_use]
    pub fn venv_dir(&self) -> &Path {
        &self.venv_dir
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Moves the protocol forward.
    ///
    /// `completed` must carry the output of the last [`Action::Run`] and be
    /// `None` on the first call.
    ///
    /// # Errors
    ///
    /// Returns provisioning errors ([`VenvError`]) and protocol misuse errors.
    pub fn advance(&mut self, completed: Option<RunOutput>) -> Result<Action> {
        match self.phase {
            Phase::Start => {
                if self.venv_dir.exists() {
                    debug!("venv already exists; skipping creation");
                    self.begin_activation()
                } else {
                    self.locate_interpreter(0)
                }
            }
            Phase::LocatingInterpreter { candidate } => {
                let output = expect_output(completed, self.phase)?;
                let name = HOST_PYTHON_CANDIDATES[candidate];
                if output.success() {
                    debug!("{name} found");
                    self.phase = Phase::CreatingEnvironment;
                    Ok(Action::Run(venv_create_command(
                        name,
                        &self.venv_dir,
                        &self.work_dir,
                    )))
                } else if candidate + 1 < HOST_PYTHON_CANDIDATES.len() {
                    self.locate_interpreter(candidate + 1)
                } else {
                    Err(VenvError::InterpreterNotAvailable {
                        tried: HOST_PYTHON_CANDIDATES.iter().map(ToString::to_string).collect(),
                    }
                    .into())
                }
            }
            Phase::CreatingEnvironment => {
                let output = expect_output(completed, self.phase)?;
                if output.success() {
                    debug!(venv_dir = %self.venv_dir.display(), "venv created");
                } else {
                    error!(
                        code = output.code,
                        stderr = %output.stderr_text(),
                        "venv create command failed"
                    );
                }
                self.begin_activation()
            }
            Phase::Activating => {
                let output = expect_output(completed, self.phase)?;
                StageReport::new(STAGE_ACTIVATE, &output).log();
                if !output.success() {
                    return Ok(self.finish(output.code));
                }
                if self.package_text.is_empty() {
                    Ok(self.execute_script(output.stdout))
                } else {
                    self.phase = Phase::Installing;
                    Ok(Action::Run(self.install_command(output.stdout)))
                }
            }
            Phase::Installing => {
                let output = expect_output(completed, self.phase)?;
                StageReport::new(STAGE_INSTALL, &output).log();
                if !output.success() {
                    return Ok(self.finish(output.code));
                }
                Ok(self.execute_script(output.stdout))
            }
            Phase::Executing => {
                let output = expect_output(completed, self.phase)?;
                StageReport::new(STAGE_PYTHON, &output).log();
                Ok(self.finish(output.code))
            }
            Phase::Finished(code) => Ok(Action::Exit(code)),
        }
    }

    fn locate_interpreter(&mut self, candidate: usize) -> Result<Action> {
        self.phase = Phase::LocatingInterpreter { candidate };
        Ok(Action::Run(lookup_command(
            HOST_PYTHON_CANDIDATES[candidate],
            self.platform,
            &self.work_dir,
        )))
    }

    fn begin_activation(&mut self) -> Result<Action> {
        let (program, args) = prepare_activation(&self.venv_dir, self.platform)?;
        mark_in_venv();
        self.phase = Phase::Activating;
        Ok(Action::Run(
            CommandSpec::new(STAGE_ACTIVATE, program, args).cwd(&self.work_dir),
        ))
    }

    fn install_command(&self, stdin: Vec<u8>) -> CommandSpec {
        let python = venv_python_path(&self.venv_dir, self.platform);
        let spec = CommandSpec::new(
            STAGE_INSTALL,
            python.to_string_lossy(),
            vec![
                "-m".to_string(),
                "pip".to_string(),
                "install".to_string(),
                self.package_text.clone(),
            ],
        )
        .cwd(&self.work_dir)
        .stdin(stdin);
        debug!(command = ?spec.argv(), "pip install command");
        spec
    }

    fn execute_script(&mut self, stdin: Vec<u8>) -> Action {
        let python = venv_python_path(&self.venv_dir, self.platform);
        let mut args = Vec::with_capacity(self.script.args.len() + 1);
        args.push(self.script.script.clone());
        args.extend(self.script.args.iter().cloned());
        let spec = CommandSpec::new(STAGE_PYTHON, python.to_string_lossy(), args)
            .cwd(&self.work_dir)
            .stdin(stdin);
        debug!(command = ?spec.argv(), "execute command");
        self.phase = Phase::Executing;
        Action::Run(spec)
    }

    fn finish(&mut self, code: i32) -> Action {
        self.phase = Phase::Finished(code);
        Action::Exit(code)
    }
}

fn expect_output(completed: Option<RunOutput>, phase: Phase) -> Result<RunOutput> {
    completed.ok_or_else(|| anyhow!("no process output supplied while {phase:?}"))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};

    use crate::effects::{AsyncProcessRunner, ProcessRunner};
    use crate::process::{CommandSpec, RunOutput};

    /// Replays canned outputs and records every command it was asked to run.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        outputs: Mutex<VecDeque<RunOutput>>,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(outputs: impl IntoIterator<Item = RunOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn seen(&self) -> Vec<CommandSpec> {
            self.seen.lock().unwrap().clone()
        }

        pub(crate) fn labels(&self) -> Vec<String> {
            self.seen().into_iter().map(|spec| spec.label).collect()
        }

        fn next(&self, spec: &CommandSpec) -> Result<RunOutput> {
            self.seen.lock().unwrap().push(spec.clone());
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow!("unexpected command {:?}", spec.argv()))
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<RunOutput> {
            self.next(spec)
        }
    }

    impl AsyncProcessRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<RunOutput> {
            self.next(spec)
        }
    }
}
