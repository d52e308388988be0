use std::env;

use tracing::debug;

use crate::config::SENTINEL_ENV;

/// Whether this process already runs inside the isolated environment.
///
/// Only presence of the sentinel matters; its value is ignored.
#[must_use]
pub fn is_in_venv() -> bool {
    let value = env::var_os(SENTINEL_ENV);
    debug!(?value, "{}", SENTINEL_ENV);
    value.is_some()
}

/// Same check for callers already on a tokio task.
pub async fn is_in_venv_async() -> bool {
    is_in_venv()
}

/// Sets the sentinel for this process and every child spawned afterwards.
pub(crate) fn mark_in_venv() {
    env::set_var(SENTINEL_ENV, "1");
}


#[cfg(test)]
mod tests {
    use super::testing::SentinelGuard;
    use super::*;
    use serial_test::serial;
    use std::process::Command;

    #[test]
    #[serial]
    fn host_process_is_not_isolated() {
        let _guard = SentinelGuard::clear();
        assert!(!is_in_venv());
    }

    #[test]
    #[serial]
    fn any_value_counts_as_present() {
        let _guard = SentinelGuard::clear();
        env::set_var(SENTINEL_ENV, "");
        assert!(is_in_venv());
    }

    #[tokio::test]
    #[serial]
    async fn async_probe_matches_blocking_probe() {
        let _guard = SentinelGuard::clear();
        assert!(!is_in_venv_async().await);
        mark_in_venv();
        assert!(is_in_venv_async().await);
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn children_inherit_the_marker() {
        let _guard = SentinelGuard::clear();
        mark_in_venv();
        let output = Command::new("/bin/sh")
            .args(["-c", &format!("printf %s \"${{{SENTINEL_ENV}+set}}\"")])
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "set");
    }
}
