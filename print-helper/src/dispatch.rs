//! Print Dispatcher
//!
//! Invoice printing walks a fixed fallback chain. The chain is the
//! [`STAGES`] table: each stage has a precondition and a kind, and a single
//! loop runs them in order until one succeeds.
//!
//! | Stage | Precondition | Action | Mode |
//! |-------|--------------|--------|------|
//! | Structured | always | PDF via OS print path | `pdf` |
//! | TextFallback | backend has a legacy print command | plain text via legacy command | `text` |
//! | RawFallback | `rawShare` configured | ESC/POS bytes copied to the share | `escpos` |
//!
//! When every stage fails the first (structured) error is returned. Every
//! transition is written to the diagnostic log with its elapsed time.
//!
//! Ad-hoc printing (`/print-text`, `/print-pdf`) goes through
//! [`Dispatcher::print_direct`]: same resolution, no fallbacks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use pos_printer::{CommandOutput, PrintBackend, PrintError, PrintOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::diagnostics::DiagnosticLog;
use crate::directory::{PrinterDirectory, ResolveError};
use crate::render::{self, Invoice, RenderError};
use crate::store::{ConfigStore, PrinterConfig};

// =============================================================================
// Errors
// =============================================================================

/// Why a single stage failed
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Print(#[from] PrintError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),

    #[error("No printer resolved")]
    Resolution(ResolveError),

    /// Every applicable stage failed; carries the structured stage's error
    #[error("{source}")]
    Exhausted {
        source: StageFailure,
        printer: String,
    },

    /// Ad-hoc print failed (no fallbacks)
    #[error("{source}")]
    Direct { source: PrintError, printer: String },

    #[error("Artifact write failed: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Stage table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Structured,
    TextFallback,
    RawFallback,
}

impl StageKind {
    pub fn mode(self) -> PrintMode {
        match self {
            StageKind::Structured => PrintMode::Pdf,
            StageKind::TextFallback => PrintMode::Text,
            StageKind::RawFallback => PrintMode::EscPos,
        }
    }
}

/// What a stage's precondition can see
#[derive(Debug, Clone)]
pub struct StageContext {
    pub legacy_print: bool,
    pub raw_share: Option<String>,
}

pub struct Stage {
    pub kind: StageKind,
    pub precondition: fn(&StageContext) -> bool,
}

fn always(_: &StageContext) -> bool {
    true
}

fn has_legacy_print(ctx: &StageContext) -> bool {
    ctx.legacy_print
}

fn has_raw_share(ctx: &StageContext) -> bool {
    ctx.raw_share.is_some()
}

/// Invoice fallback chain, in execution order
pub const STAGES: &[Stage] = &[
    Stage {
        kind: StageKind::Structured,
        precondition: always,
    },
    Stage {
        kind: StageKind::TextFallback,
        precondition: has_legacy_print,
    },
    Stage {
        kind: StageKind::RawFallback,
        precondition: has_raw_share,
    },
];

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintMode {
    Pdf,
    Text,
    #[serde(rename = "escpos")]
    EscPos,
}

impl PrintMode {
    /// `fallback` value reported to callers; none for the primary path
    pub fn fallback(self) -> Option<PrintMode> {
        match self {
            PrintMode::Pdf => None,
            other => Some(other),
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            PrintMode::Pdf => "Invoice print sent",
            PrintMode::Text => "Invoice print sent (txt fallback)",
            PrintMode::EscPos => "Invoice print sent (ESC fallback)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Succeeded,
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttempt {
    pub kind: StageKind,
    pub result: StageResult,
}

#[derive(Debug, Clone)]
pub struct PrintOutcome {
    pub printer: String,
    pub mode: PrintMode,
    pub attempts: Vec<StageAttempt>,
}

// =============================================================================
// Artifacts
// =============================================================================

/// Per-request temporary files sharing one unique stem
#[derive(Debug)]
pub struct ArtifactSet {
    dir: PathBuf,
    stem: String,
    paths: Vec<PathBuf>,
}

impl ArtifactSet {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            dir: dir.into(),
            stem: format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &id[..8]),
            paths: Vec::new(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub async fn write(&mut self, extension: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.{}", self.stem, extension));
        // Tracked before the write so a partial file is still cleaned up
        self.paths.push(path.clone());
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Delete every artifact; already-missing files are fine
    pub async fn cleanup(self) {
        for path in self.paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Artifact cleanup failed"),
            }
        }
    }

    /// Delete every artifact after `delay`, detached from the request
    pub fn schedule_cleanup(self, delay: Duration) {
        if self.paths.is_empty() {
            return;
        }
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.cleanup().await;
        });
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub artifact_dir: PathBuf,
    pub cleanup_delay: Duration,
    pub print_delay: Duration,
    /// Log the full printer enumeration before each invoice print
    pub verbose: bool,
}

/// Ad-hoc document kinds accepted by [`Dispatcher::print_direct`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectKind {
    Text,
    Pdf,
}

impl DirectKind {
    fn prefix(self) -> &'static str {
        match self {
            DirectKind::Text => "text",
            DirectKind::Pdf => "upload",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            DirectKind::Text => "txt",
            DirectKind::Pdf => "pdf",
        }
    }
}

pub struct Dispatcher {
    backend: Arc<dyn PrintBackend>,
    directory: Arc<PrinterDirectory>,
    store: Arc<ConfigStore>,
    log: DiagnosticLog,
    settings: DispatchSettings,
}

fn elapsed_ms(started: Instant) -> u128 {
    started.elapsed().as_millis()
}

fn command_summary(output: &CommandOutput) -> String {
    format!(
        "stdout={} stderr={}",
        output.stdout_line(),
        output.stderr_line()
    )
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn PrintBackend>,
        directory: Arc<PrinterDirectory>,
        store: Arc<ConfigStore>,
        log: DiagnosticLog,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            backend,
            directory,
            store,
            log,
            settings,
        }
    }

    /// Print an invoice through the full fallback chain
    pub async fn print_invoice(
        &self,
        invoice: &Invoice,
        explicit: Option<&str>,
    ) -> Result<PrintOutcome, DispatchError> {
        if invoice.lines.is_empty() {
            return Err(DispatchError::Validation("invoice.lines required".into()));
        }

        let config = match self.directory.auto_assign_default(&self.store).await {
            Ok(cfg) => cfg,
            Err(e) => {
                self.log.append(format!("AUTO_PRINTER_ERROR: {}", e));
                self.store.snapshot()
            }
        };

        let printer = match self.directory.resolve(explicit, &config).await {
            Ok(name) => name,
            Err(e) => {
                self.log
                    .append(format!("PRINT_INVOICE_ERROR: no printer resolved ({:?})", e));
                return Err(DispatchError::Resolution(e));
            }
        };

        if self.settings.verbose {
            let names = self.directory.discover_names().await;
            self.log.append(format!(
                "VERBOSE_PRINTERS: {}",
                serde_json::to_string(&names).unwrap_or_default()
            ));
        }

        let mut artifacts = ArtifactSet::new(&self.settings.artifact_dir, "inv");
        let result = self
            .run_chain(invoice, printer, &config, &mut artifacts)
            .await;
        artifacts.schedule_cleanup(self.settings.cleanup_delay);

        match &result {
            Ok(outcome) => info!(
                printer = %outcome.printer,
                mode = ?outcome.mode,
                "Invoice printed"
            ),
            Err(e) => self.log.append(format!("PRINT_INVOICE_ERROR: {}", e)),
        }
        result
    }

    async fn run_chain(
        &self,
        invoice: &Invoice,
        printer: String,
        config: &PrinterConfig,
        artifacts: &mut ArtifactSet,
    ) -> Result<PrintOutcome, DispatchError> {
        let ctx = StageContext {
            legacy_print: self.backend.supports_legacy_print(),
            raw_share: config.raw_share().map(str::to_string),
        };
        let options = PrintOptions::from_settings(printer.as_str(), &config.settings);

        let mut attempts = Vec::with_capacity(STAGES.len());
        let mut first_failure: Option<StageFailure> = None;

        for stage in STAGES {
            if !(stage.precondition)(&ctx) {
                self.log_skipped(stage.kind);
                attempts.push(StageAttempt {
                    kind: stage.kind,
                    result: StageResult::Skipped,
                });
                continue;
            }

            let started = Instant::now();
            match self
                .run_stage(stage.kind, invoice, &options, &ctx, artifacts)
                .await
            {
                Ok(()) => {
                    self.log_success(stage.kind, &printer, &ctx, started);
                    attempts.push(StageAttempt {
                        kind: stage.kind,
                        result: StageResult::Succeeded,
                    });
                    return Ok(PrintOutcome {
                        printer,
                        mode: stage.kind.mode(),
                        attempts,
                    });
                }
                Err(failure) => {
                    self.log_failure(stage.kind, &failure, started).await;
                    attempts.push(StageAttempt {
                        kind: stage.kind,
                        result: StageResult::Failed(failure.to_string()),
                    });
                    first_failure.get_or_insert(failure);
                }
            }
        }

        let source = first_failure.unwrap_or_else(|| {
            StageFailure::Print(PrintError::Unsupported("no print stage applicable".into()))
        });
        Err(DispatchError::Exhausted { source, printer })
    }

    async fn run_stage(
        &self,
        kind: StageKind,
        invoice: &Invoice,
        options: &PrintOptions,
        ctx: &StageContext,
        artifacts: &mut ArtifactSet,
    ) -> Result<(), StageFailure> {
        match kind {
            StageKind::Structured => {
                let bytes = render::pdf::render(invoice)?;
                let path = artifacts.write("pdf", &bytes).await?;
                self.log.append(format!(
                    "PRINT_INVOICE_FILE_READY path={} size={}",
                    path.display(),
                    bytes.len()
                ));
                self.log.append(format!(
                    "PRINT_INVOICE_ATTEMPT file={} printer={} opts={}",
                    path.display(),
                    options.printer,
                    serde_json::to_string(options).unwrap_or_default()
                ));
                if !self.settings.print_delay.is_zero() {
                    tokio::time::sleep(self.settings.print_delay).await;
                    self.log.append(format!(
                        "PRINT_INVOICE_DELAY_APPLIED ms={}",
                        self.settings.print_delay.as_millis()
                    ));
                }
                self.backend.submit_document(&path, options).await?;
            }
            StageKind::TextFallback => {
                let text = render::text::render(invoice);
                let path = artifacts.write("txt", text.as_bytes()).await?;
                self.log.append(format!(
                    "PRINT_INVOICE_FALLBACK_TXT_ATTEMPT file={}",
                    path.display()
                ));
                let output = self.backend.legacy_print(&options.printer, &path).await?;
                self.log.append(format!(
                    "PRINT_INVOICE_FALLBACK_TXT_RESULT {}",
                    command_summary(&output)
                ));
            }
            StageKind::RawFallback => {
                let Some(share) = ctx.raw_share.as_deref() else {
                    return Err(PrintError::InvalidConfig("rawShare not configured".into()).into());
                };
                let bytes = render::escpos::render(invoice);
                let path = artifacts.write("esc", &bytes).await?;
                self.log.append(format!(
                    "PRINT_INVOICE_FALLBACK_ESC_ATTEMPT file={} share={}",
                    path.display(),
                    share
                ));
                let output = self.backend.copy_raw(&path, share).await?;
                self.log.append(format!(
                    "PRINT_INVOICE_FALLBACK_ESC_RESULT {}",
                    command_summary(&output)
                ));
            }
        }
        Ok(())
    }

    fn log_skipped(&self, kind: StageKind) {
        match kind {
            StageKind::Structured => {}
            StageKind::TextFallback => self
                .log
                .append("PRINT_INVOICE_FALLBACK_TXT_SKIPPED no legacy print command"),
            StageKind::RawFallback => self
                .log
                .append("PRINT_INVOICE_FALLBACK_ESC_SKIPPED no rawShare configured"),
        }
    }

    fn log_success(&self, kind: StageKind, printer: &str, ctx: &StageContext, started: Instant) {
        let ms = elapsed_ms(started);
        let line = match kind {
            StageKind::Structured => {
                format!("PRINT_INVOICE_SUCCESS printer={} elapsed_ms={}", printer, ms)
            }
            StageKind::TextFallback => format!(
                "PRINT_INVOICE_FALLBACK_TXT_SUCCESS printer={} elapsed_ms={}",
                printer, ms
            ),
            StageKind::RawFallback => format!(
                "PRINT_INVOICE_FALLBACK_ESC_SUCCESS share={} elapsed_ms={}",
                ctx.raw_share.as_deref().unwrap_or_default(),
                ms
            ),
        };
        self.log.append(line);
    }

    async fn log_failure(&self, kind: StageKind, failure: &StageFailure, started: Instant) {
        let ms = elapsed_ms(started);
        match kind {
            StageKind::Structured => {
                let mut line = format!("PRINT_INVOICE_LIB_ERROR: message={}", failure);
                if let StageFailure::Print(e) = failure {
                    if let Some(code) = e.code() {
                        line.push_str(&format!(" code={}", code));
                    }
                    if let Some(stderr) = e.stderr() {
                        line.push_str(&format!(" stderr={}", stderr.trim()));
                    }
                    if let Some(stdout) = e.stdout() {
                        line.push_str(&format!(" stdout={}", stdout.trim()));
                    }
                }
                line.push_str(&format!(" elapsed_ms={}", ms));
                self.log.append(line);

                // One more enumeration to show what the OS sees after the failure
                let names = self.directory.discover_names().await;
                self.log.append(format!(
                    "PRINT_INVOICE_AFTER_FAIL_PRINTERS: {}",
                    serde_json::to_string(&names).unwrap_or_default()
                ));
            }
            StageKind::TextFallback => self.log.append(format!(
                "PRINT_INVOICE_FALLBACK_TXT_ERROR: {} elapsed_ms={}",
                failure, ms
            )),
            StageKind::RawFallback => self.log.append(format!(
                "PRINT_INVOICE_FALLBACK_ESC_ERROR: {} elapsed_ms={}",
                failure, ms
            )),
        }
    }

    /// Print a document directly: resolve, submit, surface any OS error
    ///
    /// `settings` overrides the configured submission settings when given.
    pub async fn print_direct(
        &self,
        kind: DirectKind,
        bytes: &[u8],
        explicit: Option<&str>,
        settings: Option<&Map<String, Value>>,
    ) -> Result<String, DispatchError> {
        let config = self.store.snapshot();
        let printer = self
            .directory
            .resolve(explicit, &config)
            .await
            .map_err(DispatchError::Resolution)?;

        let options =
            PrintOptions::from_settings(printer.as_str(), settings.unwrap_or(&config.settings));

        let mut artifacts = ArtifactSet::new(&self.settings.artifact_dir, kind.prefix());
        let result = self.submit_direct(&mut artifacts, kind, bytes, &options).await;
        artifacts.schedule_cleanup(self.settings.cleanup_delay);

        match result {
            Ok(()) => {
                info!(printer = %printer, kind = ?kind, "Document printed");
                Ok(printer)
            }
            Err(DispatchError::Direct { source, .. }) => {
                self.log
                    .append(format!("PRINT_DIRECT_ERROR printer={} error={}", printer, source));
                Err(DispatchError::Direct { source, printer })
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_direct(
        &self,
        artifacts: &mut ArtifactSet,
        kind: DirectKind,
        bytes: &[u8],
        options: &PrintOptions,
    ) -> Result<(), DispatchError> {
        let path = artifacts.write(kind.extension(), bytes).await?;
        self.submit(&path, options)
            .await
            .map_err(|source| DispatchError::Direct {
                source,
                printer: options.printer.clone(),
            })
    }

    async fn submit(&self, path: &Path, options: &PrintOptions) -> Result<(), PrintError> {
        self.backend.submit_document(path, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::InvoiceLine;
    use crate::testing::{BackendCall, FakeBackend};
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        dir: PathBuf,
        backend: Arc<FakeBackend>,
        store: Arc<ConfigStore>,
        log: DiagnosticLog,
        dispatcher: Dispatcher,
    }

    fn harness(backend: FakeBackend) -> Harness {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let backend = Arc::new(backend);
        let log = DiagnosticLog::new(dir.join("print_backend.log"));
        let store = Arc::new(ConfigStore::open(dir.join("config.json")));
        let directory = Arc::new(PrinterDirectory::new(backend.clone(), log.clone()));
        let dispatcher = Dispatcher::new(
            backend.clone(),
            directory,
            store.clone(),
            log.clone(),
            DispatchSettings {
                artifact_dir: dir.join("tmp"),
                cleanup_delay: Duration::ZERO,
                print_delay: Duration::ZERO,
                verbose: false,
            },
        );
        Harness {
            _dir: tmp,
            dir,
            backend,
            store,
            log,
            dispatcher,
        }
    }

    fn tea() -> Invoice {
        Invoice {
            lines: vec![InvoiceLine {
                name: Some("Tea".into()),
                qty: Some(2.0),
                unit_price: 10.0,
                line_total: 20.0,
            }],
            subtotal: 20.0,
            grand_total: 20.0,
            ..Default::default()
        }
    }

    fn log_text(h: &Harness) -> String {
        std::fs::read_to_string(h.log.path()).unwrap_or_default()
    }

    fn kinds(outcome_attempts: &[StageAttempt]) -> Vec<(StageKind, bool)> {
        outcome_attempts
            .iter()
            .map(|a| (a.kind, a.result == StageResult::Succeeded))
            .collect()
    }

    #[test]
    fn test_stage_table_order_and_preconditions() {
        let order: Vec<_> = STAGES.iter().map(|s| s.kind).collect();
        assert_eq!(
            order,
            vec![
                StageKind::Structured,
                StageKind::TextFallback,
                StageKind::RawFallback
            ]
        );

        let bare = StageContext {
            legacy_print: false,
            raw_share: None,
        };
        let runs: Vec<bool> = STAGES.iter().map(|s| (s.precondition)(&bare)).collect();
        assert_eq!(runs, vec![true, false, false]);

        let full = StageContext {
            legacy_print: true,
            raw_share: Some("POS58".into()),
        };
        assert!(STAGES.iter().all(|s| (s.precondition)(&full)));
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(serde_json::to_value(PrintMode::Text).unwrap(), "text");
        assert_eq!(serde_json::to_value(PrintMode::EscPos).unwrap(), "escpos");
        assert_eq!(PrintMode::Pdf.fallback(), None);
    }

    #[tokio::test]
    async fn test_primary_success() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        let outcome = h.dispatcher.print_invoice(&tea(), None).await.unwrap();

        assert_eq!(outcome.printer, "POS58");
        assert_eq!(outcome.mode, PrintMode::Pdf);
        assert_eq!(kinds(&outcome.attempts), vec![(StageKind::Structured, true)]);

        let log = log_text(&h);
        assert!(log.contains("PRINT_INVOICE_FILE_READY"));
        assert!(log.contains("PRINT_INVOICE_ATTEMPT"));
        assert!(log.contains("PRINT_INVOICE_SUCCESS printer=POS58"));
    }

    #[tokio::test]
    async fn test_single_printer_resolved_without_name() {
        let h = harness(FakeBackend::new().with_printers(&["Kitchen"]));
        let outcome = h.dispatcher.print_invoice(&tea(), None).await.unwrap();
        assert_eq!(outcome.printer, "Kitchen");
        assert_eq!(
            h.store.snapshot().default_printer.as_deref(),
            Some("Kitchen")
        );
    }

    #[tokio::test]
    async fn test_text_before_raw() {
        let h = harness(
            FakeBackend::new()
                .with_printers(&["POS58"])
                .with_submit_failure()
                .with_legacy_failure(),
        );
        h.store
            .update(|cfg| cfg.raw_share = Some("POS58".into()))
            .await
            .unwrap();

        let outcome = h.dispatcher.print_invoice(&tea(), None).await.unwrap();
        assert_eq!(outcome.mode, PrintMode::EscPos);
        assert_eq!(
            kinds(&outcome.attempts),
            vec![
                (StageKind::Structured, false),
                (StageKind::TextFallback, false),
                (StageKind::RawFallback, true)
            ]
        );

        let calls: Vec<_> = h
            .backend
            .calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    BackendCall::Submit { .. } | BackendCall::Legacy { .. } | BackendCall::Raw { .. }
                )
            })
            .collect();
        assert!(matches!(calls[0], BackendCall::Submit { .. }));
        assert!(matches!(calls[1], BackendCall::Legacy { .. }));
        assert!(matches!(&calls[2], BackendCall::Raw { share, .. } if share == "POS58"));

        let log = log_text(&h);
        let lib = log.find("PRINT_INVOICE_LIB_ERROR").unwrap();
        let txt = log.find("PRINT_INVOICE_FALLBACK_TXT_ERROR").unwrap();
        let esc = log.find("PRINT_INVOICE_FALLBACK_ESC_SUCCESS").unwrap();
        assert!(lib < txt && txt < esc);
        assert!(log.contains("PRINT_INVOICE_AFTER_FAIL_PRINTERS"));
    }

    #[tokio::test]
    async fn test_raw_skipped_without_share() {
        let h = harness(
            FakeBackend::new()
                .with_printers(&["POS58"])
                .with_submit_failure()
                .with_legacy_failure(),
        );

        let err = h.dispatcher.print_invoice(&tea(), None).await.unwrap_err();
        match err {
            DispatchError::Exhausted { source, printer } => {
                assert_eq!(printer, "POS58");
                // The structured stage's error, not the text fallback's
                assert!(source.to_string().contains("submit"), "{}", source);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(
            !h.backend
                .calls()
                .iter()
                .any(|c| matches!(c, BackendCall::Raw { .. }))
        );
        assert!(log_text(&h).contains("PRINT_INVOICE_FALLBACK_ESC_SKIPPED no rawShare configured"));
    }

    #[tokio::test]
    async fn test_text_fallback_success() {
        let h = harness(
            FakeBackend::new()
                .with_printers(&["POS58"])
                .with_submit_failure(),
        );
        let outcome = h.dispatcher.print_invoice(&tea(), None).await.unwrap();
        assert_eq!(outcome.mode, PrintMode::Text);
        assert_eq!(outcome.mode.fallback(), Some(PrintMode::Text));
        assert!(log_text(&h).contains("PRINT_INVOICE_FALLBACK_TXT_SUCCESS printer=POS58"));
    }

    #[tokio::test]
    async fn test_no_legacy_print_goes_straight_to_raw() {
        let h = harness(
            FakeBackend::new()
                .with_printers(&["POS58"])
                .with_submit_failure()
                .without_legacy_print(),
        );
        h.store
            .update(|cfg| cfg.raw_share = Some("RAW".into()))
            .await
            .unwrap();

        let outcome = h.dispatcher.print_invoice(&tea(), None).await.unwrap();
        assert_eq!(outcome.mode, PrintMode::EscPos);
        assert_eq!(outcome.attempts[1].result, StageResult::Skipped);
    }

    #[tokio::test]
    async fn test_zero_printers_is_resolution_error_without_artifacts() {
        let h = harness(FakeBackend::new());
        let err = h.dispatcher.print_invoice(&tea(), None).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Resolution(ResolveError::NoPrinters)
        ));

        let tmp = h.dir.join("tmp");
        let leftover = std::fs::read_dir(&tmp)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
        assert!(h.backend.calls().iter().all(|c| !matches!(c, BackendCall::Submit { .. })));
    }

    #[tokio::test]
    async fn test_ambiguous_lists_candidates() {
        let h = harness(FakeBackend::new().with_printers(&["Office", "Canon"]));
        let err = h.dispatcher.print_invoice(&tea(), None).await.unwrap_err();
        match err {
            DispatchError::Resolution(ResolveError::Ambiguous(names)) => {
                assert_eq!(names, vec!["Office", "Canon"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_lines_rejected() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        let err = h
            .dispatcher
            .print_invoice(&Invoice::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(m) if m == "invoice.lines required"));
    }

    #[tokio::test]
    async fn test_options_honor_whitelist() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        h.store
            .update(|cfg| {
                cfg.settings.insert("monochrome".into(), Value::Bool(true));
                cfg.settings.insert("scale".into(), Value::String("fit".into()));
            })
            .await
            .unwrap();

        h.dispatcher.print_invoice(&tea(), Some("Explicit")).await.unwrap();
        let submitted = h.backend.calls().into_iter().find_map(|c| match c {
            BackendCall::Submit { options, .. } => Some(options),
            _ => None,
        });
        let options = submitted.unwrap();
        assert_eq!(options.printer, "Explicit");
        assert_eq!(options.monochrome, Some(true));
        assert_eq!(options.copies, None);
    }

    #[tokio::test]
    async fn test_artifacts_cleaned_up() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        let mut artifacts = ArtifactSet::new(h.dir.join("tmp"), "inv");
        let pdf = artifacts.write("pdf", b"%PDF").await.unwrap();
        let txt = artifacts.write("txt", b"hello").await.unwrap();
        assert_eq!(pdf.file_stem(), txt.file_stem());
        assert!(
            pdf.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("inv_")
        );

        // Already gone: cleanup must not care
        std::fs::remove_file(&txt).unwrap();
        artifacts.cleanup().await;
        assert!(!pdf.exists());
    }

    #[tokio::test]
    async fn test_scheduled_cleanup_after_print() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        h.dispatcher.print_invoice(&tea(), None).await.unwrap();

        let tmp = h.dir.join("tmp");
        for _ in 0..50 {
            if std::fs::read_dir(&tmp).unwrap().count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_direct_print_has_no_fallback() {
        let h = harness(
            FakeBackend::new()
                .with_printers(&["POS58"])
                .with_submit_failure(),
        );
        let err = h
            .dispatcher
            .print_direct(DirectKind::Text, b"hello", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Direct { ref printer, .. } if printer == "POS58"));
        assert!(
            !h.backend
                .calls()
                .iter()
                .any(|c| matches!(c, BackendCall::Legacy { .. } | BackendCall::Raw { .. }))
        );
    }

    #[tokio::test]
    async fn test_direct_print_settings_override() {
        let h = harness(FakeBackend::new().with_printers(&["POS58"]));
        let mut settings = Map::new();
        settings.insert("copies".into(), Value::from(3));

        let used = h
            .dispatcher
            .print_direct(DirectKind::Pdf, b"%PDF-1.4", None, Some(&settings))
            .await
            .unwrap();
        assert_eq!(used, "POS58");

        let (path, options) = h
            .backend
            .calls()
            .into_iter()
            .find_map(|c| match c {
                BackendCall::Submit { path, options } => Some((path, options)),
                _ => None,
            })
            .unwrap();
        assert_eq!(options.copies, Some(3));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
    }
}
