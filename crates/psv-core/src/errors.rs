use std::path::PathBuf;

use serde_json::{json, Value};

/// Fatal problems raised while resolving or provisioning the isolated environment.
///
/// Non-zero exit codes from activation, install or the relaunched script are not
/// errors; they travel back to the caller as plain exit codes.
#[derive(Debug, thiserror::Error)]
pub enum VenvError {
    #[error("venv parent directory is not found: {} is not a directory", path.display())]
    CenterNotDirectory { path: PathBuf },
    #[error("venv parent directory is not accessible: {}", path.display())]
    CenterNotAccessible { path: PathBuf },
    #[error("home directory could not be determined")]
    HomeDirectoryUnavailable,
    #[error("venv is not directory: {}", path.display())]
    NotADirectory { path: PathBuf },
    #[error("venv is not accessible: {}", path.display())]
    NotAccessible { path: PathBuf },
    #[error("python is not available (tried {})", tried.join(", "))]
    InterpreterNotAvailable { tried: Vec<String> },
    #[error("venv activate command is not found: {}", path.display())]
    ActivationNotFound { path: PathBuf },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl VenvError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CenterNotDirectory { .. }
            | Self::CenterNotAccessible { .. }
            | Self::HomeDirectoryUnavailable => "PSV101",
            Self::NotADirectory { .. } | Self::NotAccessible { .. } => "PSV102",
            Self::InterpreterNotAvailable { .. } => "PSV201",
            Self::ActivationNotFound { .. } => "PSV202",
            Self::Spawn { .. } => "PSV301",
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CenterNotDirectory { .. } => "center_not_directory",
            Self::CenterNotAccessible { .. } => "center_not_accessible",
            Self::HomeDirectoryUnavailable => "home_unavailable",
            Self::NotADirectory { .. } => "venv_not_directory",
            Self::NotAccessible { .. } => "venv_not_accessible",
            Self::InterpreterNotAvailable { .. } => "python_not_available",
            Self::ActivationNotFound { .. } => "activate_not_found",
            Self::Spawn { .. } => "spawn_failed",
        }
    }

    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CenterNotDirectory { .. } => {
                Some("Remove or rename the file occupying ~/.local/share/pyshell_venv.")
            }
            Self::CenterNotAccessible { .. } => {
                Some("Grant write and execute permission on the center directory.")
            }
            Self::HomeDirectoryUnavailable => Some("Set HOME, or use --local-project."),
            Self::NotADirectory { .. } => {
                Some("Remove the file at the environment path or pick another --env-name.")
            }
            Self::NotAccessible { .. } => {
                Some("Grant write and execute permission on the environment directory.")
            }
            Self::InterpreterNotAvailable { .. } => {
                Some("Install Python 3 and make sure python3, python or py is on PATH.")
            }
            Self::ActivationNotFound { .. } => {
                Some("The environment looks incomplete; delete it so it gets recreated.")
            }
            Self::Spawn { .. } => None,
        }
    }

    #[must_use]
    pub fn details(&self) -> Value {
        let mut details = json!({
            "code": self.code(),
            "reason": self.reason(),
        });
        if let Value::Object(map) = &mut details {
            if let Some(hint) = self.hint() {
                map.insert("hint".into(), json!(hint));
            }
            match self {
                Self::CenterNotDirectory { path }
                | Self::CenterNotAccessible { path }
                | Self::NotADirectory { path }
                | Self::NotAccessible { path }
                | Self::ActivationNotFound { path } => {
                    map.insert("path".into(), json!(path.display().to_string()));
                }
                Self::InterpreterNotAvailable { tried } => {
                    map.insert("tried".into(), json!(tried));
                }
                Self::Spawn { program, source } => {
                    map.insert("program".into(), json!(program));
                    map.insert("error".into(), json!(source.to_string()));
                }
                Self::HomeDirectoryUnavailable => {}
            }
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_distinct_directory_failures() {
        let path = PathBuf::from("/tmp/env");
        let not_dir = VenvError::NotADirectory { path: path.clone() };
        let no_access = VenvError::NotAccessible { path };
        assert!(not_dir.to_string().starts_with("venv is not directory"));
        assert!(no_access.to_string().starts_with("venv is not accessible"));
        assert_eq!(not_dir.code(), no_access.code());
        assert_ne!(not_dir.reason(), no_access.reason());
    }

    #[test]
    fn details_include_path_and_hint() {
        let err = VenvError::ActivationNotFound {
            path: PathBuf::from("/envs/default/bin/activate"),
        };
        let details = err.details();
        assert_eq!(details["code"], "PSV202");
        assert_eq!(details["path"], "/envs/default/bin/activate");
        assert!(details["hint"].as_str().is_some());
    }

    #[test]
    fn interpreter_error_lists_candidates() {
        let err = VenvError::InterpreterNotAvailable {
            tried: vec!["python3".into(), "python".into(), "py".into()],
        };
        assert_eq!(
            err.to_string(),
            "python is not available (tried python3, python, py)"
        );
        assert_eq!(err.details()["tried"][2], "py");
    }
}
