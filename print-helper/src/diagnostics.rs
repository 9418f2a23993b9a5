//! Diagnostic Log
//!
//! Append-only operational log (`print_backend.log`), one event per line:
//! `[<ISO-8601 timestamp>] <MESSAGE>`. The helper usually runs without a
//! console, so this file is what `/logs` exposes. Every line is mirrored to
//! `tracing` under the `diagnostic` target.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use tracing::warn;

/// Characters returned by the `/logs` tail
pub const TAIL_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format a single log line (with trailing newline)
    pub fn format_line(message: &str) -> String {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        // One event per line
        let message = message.replace(['\r', '\n'], " ");
        format!("[{}] {}\n", ts, message)
    }

    /// Append one event
    ///
    /// The whole line goes out in a single append write so concurrent
    /// requests never interleave within a line. Write failures are reported
    /// through tracing only.
    pub fn append(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "diagnostic", "{}", message);

        let line = Self::format_line(message);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Diagnostic log write failed");
        }
    }

    /// Last `max_chars` characters of the log; empty when no log exists yet
    pub async fn tail(&self, max_chars: usize) -> std::io::Result<String> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e),
        };
        let content = String::from_utf8_lossy(&bytes);
        let count = content.chars().count();
        if count <= max_chars {
            return Ok(content.into_owned());
        }
        Ok(content.chars().skip(count - max_chars).collect())
    }
}
