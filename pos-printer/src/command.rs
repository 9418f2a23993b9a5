//! Headless platform command runner
//!
//! Every OS interaction that shells out goes through [`run_hidden`], which
//! never opens a console window, never inherits stdin and optionally bounds
//! the call with a timeout (the child is killed when the bound expires).

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{PrintError, PrintResult};

/// Windows `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout with whitespace runs collapsed, for single-line logging
    pub fn stdout_line(&self) -> String {
        collapse_whitespace(&self.stdout)
    }

    /// Stderr with whitespace runs collapsed, for single-line logging
    pub fn stderr_line(&self) -> String {
        collapse_whitespace(&self.stderr)
    }
}

/// Collapse all whitespace runs into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run a program without a visible window and capture its output
///
/// A non-zero exit status is reported as [`PrintError::Command`] carrying
/// the captured streams. `timeout = None` waits indefinitely.
#[instrument(skip(args), fields(program = %program))]
pub async fn run_hidden<I, S>(
    program: &str,
    args: I,
    timeout: Option<Duration>,
) -> PrintResult<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| PrintError::Timeout(format!("{} exceeded {:?}", program, limit)))?,
        None => cmd.output().await,
    }
    .map_err(|source| PrintError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    debug!(code = ?result.code, "Command finished");

    if !output.status.success() {
        return Err(PrintError::Command {
            program: program.to_string(),
            code: result.code,
            stdout: result.stdout,
            stderr: result.stderr.trim().to_string(),
        });
    }

    Ok(result)
}

/// Run a blocking platform call on the blocking pool, optionally bounded
///
/// On expiry the call is abandoned (the worker thread finishes on its own)
/// and [`PrintError::Timeout`] is returned.
pub async fn run_blocking<T, F>(what: &str, timeout: Option<Duration>, f: F) -> PrintResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PrintResult<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    let joined = match timeout {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| PrintError::Timeout(format!("{} exceeded {:?}", what, limit)))?,
        None => task.await,
    };
    joined.map_err(|e| {
        PrintError::Io(std::io::Error::other(format!("{} task failed: {}", what, e)))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\r\n b\t c  "), "a b c");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_hidden_captures_stdout() {
        let out = run_hidden("sh", ["-c", "echo hello"], Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(out.stdout_line(), "hello");
        assert_eq!(out.code, Some(0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_hidden_nonzero_exit() {
        let err = run_hidden("sh", ["-c", "echo oops >&2; exit 3"], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(3));
        assert_eq!(err.stderr(), Some("oops"));
    }

    #[tokio::test]
    async fn test_run_hidden_missing_program() {
        let err = run_hidden("definitely-not-a-real-program-xyz", ["--help"], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let value = run_blocking("add", Some(Duration::from_secs(5)), || Ok(2 + 2))
            .await
            .unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test]
    async fn test_run_blocking_times_out() {
        let err = run_blocking("GetPrinterW", Some(Duration::from_millis(20)), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PrintError::Timeout(ref msg) if msg.starts_with("GetPrinterW")));
    }

    #[tokio::test]
    async fn test_run_blocking_unbounded_propagates_error() {
        let err = run_blocking::<(), _>("EnumPrintersW", None, || {
            Err(PrintError::Unsupported("spooler".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PrintError::Unsupported(_)));
    }
}
