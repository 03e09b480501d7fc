//! Bounded external process execution.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `argv[0] argv[1..]` to completion, killing it if `timeout` elapses.
///
/// A non-zero exit is *not* an error here; callers decide what it means.
pub async fn run_command(argv: &[String], timeout: Duration) -> ProviderResult<CommandOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| ProviderError::Command {
        program: String::new(),
        reason: "empty command line".to_string(),
    })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(%program, ?args, "running command");

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ProviderError::Command {
                program: program.clone(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            return Err(ProviderError::Timeout {
                what: format!("command {program:?}"),
                after: timeout,
            });
        }
    };

    Ok(CommandOutput {
        success: output.status.success(),
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_and_status() {
        let out = run_command(&argv(&["sh", "-c", "echo hello; exit 3"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn missing_program_is_command_error() {
        let err = run_command(&argv(&["/nonexistent/fleetgrid-bin"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Command { .. }));
    }

    #[tokio::test]
    async fn empty_argv_is_command_error() {
        let err = run_command(&[], Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Command { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run_command(&argv(&["sleep", "5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
    }
}
