//! Platform printing capability interface
//!
//! All OS interaction (enumeration, status, submission, legacy and raw
//! delivery) is reached through [`PrintBackend`]. Two variants exist:
//! - [`ShellBackend`]: PowerShell/cmd on Windows, CUPS tools elsewhere
//! - `NativeBackend` (Windows only): spooler API via Win32
//!
//! [`probe_backend`] picks one at startup.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::command::CommandOutput;
use crate::error::PrintResult;
use crate::shell::ShellBackend;

/// Capability variant serving OS calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Native,
    Shell,
    /// Injected implementation (tests, embedding)
    Custom,
}

/// Requested backend variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    #[default]
    Auto,
    Shell,
    Native,
}

impl std::str::FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "shell" => Ok(Self::Shell),
            "native" => Ok(Self::Native),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Raw outcome of a printer status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReport {
    /// The platform has no status facility
    Unsupported,
    /// Platform status code (Get-Printer `PrinterStatus` numbering)
    Code(u32),
    /// The query ran but its output could not be interpreted
    Unreadable,
}

/// Bounds applied to short OS queries
#[derive(Debug, Clone, Copy)]
pub struct BackendTimeouts {
    pub enumeration: Duration,
    pub status: Duration,
    /// Legacy print command and raw copy
    pub command: Duration,
}

impl Default for BackendTimeouts {
    fn default() -> Self {
        Self {
            enumeration: Duration::from_secs(10),
            status: Duration::from_secs(3),
            command: Duration::from_secs(60),
        }
    }
}

/// Options forwarded to the OS print path
///
/// Only whitelisted settings survive [`PrintOptions::from_settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrintOptions {
    pub printer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monochrome: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copies: Option<u32>,
}

impl PrintOptions {
    /// Keys honored from a settings object
    pub const WHITELIST: &'static [&'static str] = &["monochrome", "copies"];

    pub fn new(printer: impl Into<String>) -> Self {
        Self {
            printer: printer.into(),
            ..Default::default()
        }
    }

    /// Build options for `printer`, keeping only whitelisted, well-typed settings
    pub fn from_settings(printer: impl Into<String>, settings: &Map<String, Value>) -> Self {
        let monochrome = settings.get("monochrome").and_then(Value::as_bool);
        let copies = settings
            .get("copies")
            .and_then(Value::as_u64)
            .filter(|n| *n >= 1)
            .and_then(|n| u32::try_from(n).ok());

        Self {
            printer: printer.into(),
            monochrome,
            copies,
        }
    }
}

/// Map a spooler status bitmask to the `PrinterStatus` code numbering
///
/// Win32 `PRINTER_STATUS_*` bit `n` corresponds to code `n + 1`; zero is
/// ready. The lowest set bit wins when several are raised.
pub fn status_code_from_flags(flags: u32) -> u32 {
    if flags == 0 {
        0
    } else {
        flags.trailing_zeros() + 1
    }
}

/// Platform printing capabilities
#[async_trait]
pub trait PrintBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Preferred printer enumeration (OS management query)
    async fn list_printers(&self) -> PrintResult<Vec<String>>;

    /// Secondary enumeration through a generic API
    async fn enumerate_printers(&self) -> PrintResult<Vec<String>>;

    async fn printer_status(&self, name: &str) -> PrintResult<StatusReport>;

    /// Submit a document (PDF or text) through the OS print path
    ///
    /// Not time-bounded: spoolers may legitimately take long.
    async fn submit_document(&self, path: &Path, options: &PrintOptions) -> PrintResult<()>;

    /// Whether a legacy plain-text print command exists here
    fn supports_legacy_print(&self) -> bool;

    async fn legacy_print(&self, printer: &str, path: &Path) -> PrintResult<CommandOutput>;

    /// Deliver raw bytes from `path` to a local printer share
    async fn copy_raw(&self, path: &Path, share: &str) -> PrintResult<CommandOutput>;
}

/// Select the backend variant for this process
///
/// `shell` is the configured shell variant; the native variant wraps it for
/// the operations the spooler API does not cover.
pub async fn probe_backend(
    preference: BackendPreference,
    shell: ShellBackend,
) -> Arc<dyn PrintBackend> {
    #[cfg(windows)]
    {
        use crate::native::NativeBackend;

        let native_usable = match preference {
            BackendPreference::Shell => false,
            _ => {
                let probe = tokio::task::spawn_blocking(crate::native::enum_printers).await;
                matches!(probe, Ok(Ok(_)))
            }
        };

        if native_usable {
            info!("Print backend: native spooler API");
            return Arc::new(NativeBackend::new(shell));
        }
        if preference == BackendPreference::Native {
            warn!("Native spooler probe failed, using shell backend");
        }
    }

    #[cfg(not(windows))]
    if preference == BackendPreference::Native {
        warn!("Native backend is Windows-only, using shell backend");
    }

    info!(flavor = ?shell.flavor(), "Print backend: shell commands");
    Arc::new(shell)
}
