//! Logging Infrastructure
//!
//! Structured logging setup. Console output unless a log directory is given,
//! then daily rolling files (the helper usually runs hidden).

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the logger with optional file output
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&Path>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir
        && std::fs::create_dir_all(dir).is_ok()
    {
        let file_appender = tracing_appender::rolling::daily(dir, "print-helper");
        subscriber.with_ansi(false).with_writer(file_appender).init();
        return;
    }

    subscriber.init();
}
