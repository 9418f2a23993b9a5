//! # pos-printer
//!
//! Receipt printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Windows-1252 encoding for receipt printers
//! - Platform capability interface (enumeration, status, submission)
//! - Shell-command backend (PowerShell / CUPS)
//! - Windows spooler backend (Windows only)
//!
//! Business logic (WHAT to print) stays in the print helper service.
//!
//! ## Example
//!
//! ```ignore
//! use pos_printer::{BackendPreference, BackendTimeouts, EscPosBuilder, ShellBackend, probe_backend};
//!
//! let mut builder = EscPosBuilder::new(32);
//! builder.center();
//! builder.line("INVOICE");
//! builder.left();
//! builder.sep_single();
//! builder.cut_feed(0x10);
//!
//! let shell = ShellBackend::new().with_timeouts(BackendTimeouts::default());
//! let backend = probe_backend(BackendPreference::Auto, shell).await;
//! let printers = backend.list_printers().await?;
//! ```

mod backend;
mod command;
mod encoding;
mod error;
mod escpos;
#[cfg(windows)]
mod native;
mod shell;

// Re-exports
pub use backend::{
    BackendKind, BackendPreference, BackendTimeouts, PrintBackend, PrintOptions, StatusReport,
    probe_backend, status_code_from_flags,
};
pub use command::{CommandOutput, collapse_whitespace, run_blocking, run_hidden};
pub use encoding::{convert_to_cp1252, encode_text, pad_text, text_width};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use shell::{Invocation, ShellBackend, ShellFlavor};

#[cfg(windows)]
pub use native::NativeBackend;
