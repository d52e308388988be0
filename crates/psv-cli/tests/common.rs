#![allow(dead_code)]

use std::{fs, path::Path};

use tempfile::TempDir;

pub const SENTINEL_ENV: &str = "ENV_VAR_PYSHELL_VENV";

pub fn temp_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir")
}

/// Lays out `<dir>/bin/activate` and a `python3` shell script that appends
/// its arguments to `calls.log` and exits 0 for `-m ...`, `exit_code` otherwise.
#[cfg(unix)]
pub fn fake_venv(dir: &Path, exit_code: i32) {
    use std::os::unix::fs::PermissionsExt;

    let bin = dir.join("bin");
    fs::create_dir_all(&bin).expect("create bin");
    fs::write(bin.join("activate"), "echo activated\n").expect("write activate");
    let python = bin.join("python3");
    fs::write(
        &python,
        format!(
            "#!/bin/sh\n\
             cat > /dev/null\n\
             printf '%s\\n' \"$*\" >> calls.log\n\
             case \"$1\" in -m) exit 0 ;; esac\n\
             exit {exit_code}\n"
        ),
    )
    .expect("write python3");
    fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).expect("chmod python3");
}

pub fn read_calls(work: &Path) -> String {
    fs::read_to_string(work.join("calls.log")).unwrap_or_default()
}
