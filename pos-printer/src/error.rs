//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// IO error while staging or reading a print artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A platform command ran but reported failure
    #[error("{program} failed (code {code:?}): {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// A platform command could not be started at all
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Timeout waiting for the platform
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Output from the platform could not be interpreted
    #[error("Unexpected output: {0}")]
    Parse(String),

    /// The selected backend has no facility for this operation
    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Windows spooler error
    #[cfg(windows)]
    #[error("Windows printer error: {0}")]
    WindowsPrinter(String),
}

impl PrintError {
    /// Exit code reported by the platform, if any
    pub fn code(&self) -> Option<i32> {
        match self {
            PrintError::Command { code, .. } => *code,
            PrintError::Spawn { source, .. } => source.raw_os_error(),
            PrintError::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Captured stdout, if the failure came from a command
    pub fn stdout(&self) -> Option<&str> {
        match self {
            PrintError::Command { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    /// Captured stderr, if the failure came from a command
    pub fn stderr(&self) -> Option<&str> {
        match self {
            PrintError::Command { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
