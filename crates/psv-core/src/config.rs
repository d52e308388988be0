use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

/// Directory name used under the center directory.
pub const APP_NAME: &str = "pyshell_venv";
/// Presence of this variable means the process already runs inside the isolated environment.
pub const SENTINEL_ENV: &str = "ENV_VAR_PYSHELL_VENV";
/// Base directory consulted before the home fallback.
pub const OVERRIDE_ENV: &str = "XDG_DATA_HOME";
pub const CAPTURE_LIMIT_ENV: &str = "PSV_MAX_CAPTURE_BYTES";
pub const DEFAULT_ENV_NAME: &str = "default";
pub const LOCAL_PROJECT_DIR: &str = ".venv";

const DEFAULT_MAX_CAPTURE_BYTES: usize = 1024 * 1024;

/// Immutable view of the process environment taken once per invocation.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    #[must_use]
    pub fn capture() -> Self {
        Self {
            vars: env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    #[must_use]
    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Shell flavour used to run the Windows activation script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowsShell {
    PowerShell,
    Cmd,
}

impl WindowsShell {
    /// Maps a process image name (`cmd.exe`, `pwsh`, ...) to a shell.
    #[must_use]
    pub fn from_process_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let stem = name.strip_suffix(".exe").unwrap_or(&name);
        match stem {
            "cmd" => Some(Self::Cmd),
            "powershell" | "pwsh" => Some(Self::PowerShell),
            _ => None,
        }
    }

    /// Shell that launched this process.
    ///
    /// The parent process name decides when it is a known shell. Otherwise an
    /// exported `PROMPT` (set by classic `cmd.exe`, inherited by its children)
    /// selects `Cmd`, and PowerShell is the default.
    #[must_use]
    pub fn detect(parent_name: Option<&str>, snapshot: &EnvSnapshot) -> Self {
        if let Some(shell) = parent_name.and_then(Self::from_process_name) {
            return shell;
        }
        if snapshot.contains("PROMPT") {
            Self::Cmd
        } else {
            Self::PowerShell
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "os", content = "shell")]
pub enum Platform {
    Posix,
    Windows(WindowsShell),
}

impl Platform {
    /// Platform of the running process; see [`WindowsShell::detect`].
    #[must_use]
    pub fn detect(snapshot: &EnvSnapshot) -> Self {
        #[cfg(windows)]
        {
            let parent = parent_process_name();
            tracing::debug!(?parent, "parent process");
            Self::Windows(WindowsShell::detect(parent.as_deref(), snapshot))
        }
        #[cfg(not(windows))]
        {
            let _ = snapshot;
            Self::Posix
        }
    }
}

#[cfg(windows)]
fn parent_process_name() -> Option<String> {
    use sysinfo::{ProcessesToUpdate, System};

    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    let parent = system.process(pid)?.parent()?;
    system.refresh_processes(ProcessesToUpdate::Some(&[parent]), true);
    Some(system.process(parent)?.name().to_string_lossy().into_owned())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) platform: Platform,
    pub(crate) max_capture_bytes: usize,
    pub(crate) home: Option<PathBuf>,
}

impl Config {
    #[must_use]
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            platform: Platform::detect(snapshot),
            max_capture_bytes: snapshot
                .var(CAPTURE_LIMIT_ENV)
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MAX_CAPTURE_BYTES),
            home: dirs_next::home_dir(),
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn max_capture_bytes(&self) -> usize {
        self.max_capture_bytes
    }

    #[must_use]
    pub fn home(&self) -> Option<&PathBuf> {
        self.home.as_ref()
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }
}

/// Script path and arguments that get re-launched inside the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScriptInvocation {
    pub script: String,
    pub args: Vec<String>,
}

impl ScriptInvocation {
    pub fn new(script: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            script: script.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Captures the current process's own command line (`argv[0]` and the rest).
    #[must_use]
    pub fn from_process_args() -> Self {
        Self::from_argv(env::args_os())
    }

    /// First element is the script, the rest are its arguments.
    pub fn from_argv<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut argv = argv
            .into_iter()
            .map(|arg| arg.as_ref().to_string_lossy().into_owned());
        let script = argv.next().unwrap_or_default();
        Self {
            script,
            args: argv.collect(),
        }
    }
}

/// Caller-supplied description of one relaunch.
#[derive(Debug, Clone, Default)]
pub struct VenvRequest {
    pub env_name: String,
    /// Empty means the current directory.
    pub work_directory: Option<PathBuf>,
    pub local_project: bool,
    pub require_package_text: String,
    pub script: ScriptInvocation,
}

impl VenvRequest {
    #[must_use]
    pub fn new(script: ScriptInvocation) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = name.into();
        self
    }

    #[must_use]
    pub fn work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.work_directory = if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        };
        self
    }

    #[must_use]
    pub fn local_project(mut self, enabled: bool) -> Self {
        self.local_project = enabled;
        self
    }

    #[must_use]
    pub fn require_package_text(mut self, text: impl Into<String>) -> Self {
        self.require_package_text = text.into();
        self
    }

    /// Working directory for resolution and for every child process.
    ///
    /// # Errors
    ///
    /// Returns an error when no directory was given and the current directory
    /// cannot be determined.
    pub fn resolved_work_dir(&self) -> Result<PathBuf> {
        match &self.work_directory {
            Some(dir) => std::path::absolute(dir)
                .with_context(|| format!("resolving work directory {}", dir.display())),
            None => env::current_dir().context("reading current directory"),
        }
    }
}
