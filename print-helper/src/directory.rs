//! Printer Directory
//!
//! Discovers installed printers, classifies them by name, polls live status
//! and picks a default when none is configured.
//!
//! Enumeration failures never reach callers: each failing source is logged
//! (`ENUM_PRIMARY_ERROR` / `ENUM_FALLBACK_ERROR`) and an empty directory is
//! a normal, actionable answer.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use pos_printer::{PrintBackend, StatusReport};
use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument};

use crate::diagnostics::DiagnosticLog;
use crate::store::{ConfigStore, PrinterConfig, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Usb,
    Wifi,
    Network,
    Virtual,
    Local,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterType {
    Thermal,
    Virtual,
    Standard,
}

/// Semantic printer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterStatus {
    Ready,
    Paused,
    Error,
    Deleting,
    PaperJam,
    PaperOut,
    ManualFeed,
    PaperProblem,
    Offline,
    IoActive,
    Busy,
    Printing,
    OutputBinFull,
    NotAvailable,
    Waiting,
    Processing,
    Initializing,
    WarmingUp,
    TonerLow,
    NoToner,
    PagePunt,
    UserIntervention,
    OutOfMemory,
    DoorOpen,
    ServerUnknown,
    PowerSave,
    Unknown,
}

impl PrinterStatus {
    /// Map a platform status code; second value is `connected`
    pub fn from_code(code: u32) -> (Self, bool) {
        use PrinterStatus::*;
        match code {
            0 => (Ready, true),
            1 => (Paused, true),
            2 => (Error, false),
            3 => (Deleting, false),
            4 => (PaperJam, true),
            5 => (PaperOut, true),
            6 => (ManualFeed, true),
            7 => (PaperProblem, true),
            8 => (Offline, false),
            9 => (IoActive, true),
            10 => (Busy, true),
            11 => (Printing, true),
            12 => (OutputBinFull, true),
            13 => (NotAvailable, false),
            14 => (Waiting, true),
            15 => (Processing, true),
            16 => (Initializing, true),
            17 => (WarmingUp, true),
            18 => (TonerLow, true),
            19 => (NoToner, true),
            20 => (PagePunt, true),
            21 => (UserIntervention, true),
            22 => (OutOfMemory, true),
            23 => (DoorOpen, true),
            24 => (ServerUnknown, false),
            25 => (PowerSave, true),
            _ => (Unknown, true),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub status: PrinterStatus,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u32>,
}

impl StatusInfo {
    fn unknown(connected: bool) -> Self {
        Self {
            status: PrinterStatus::Unknown,
            connected,
            status_code: None,
        }
    }
}

/// A discovered printer. Recomputed on every query, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Printer {
    pub name: String,
    pub connection_type: ConnectionType,
    pub printer_type: PrinterType,
    pub status: PrinterStatus,
    pub connected: bool,
    pub is_default: bool,
}

// === Classification ===

const VIRTUAL_TOKENS: &[&str] = &["pdf", "xps", "onenote", "fax"];
const USB_TOKENS: &[&str] = &["usb", "pos", "58", "80"];
const WIFI_TOKENS: &[&str] = &["wifi", "network", "wireless"];
const THERMAL_TOKENS: &[&str] = &["pos", "58", "80", "thermal", "receipt"];

fn contains_any(haystack: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| haystack.contains(t))
}

/// Classify the connection type from a printer name
///
/// Case-insensitive, first match wins: usb tokens, wifi tokens, UNC prefix
/// or "shared", virtual tokens, otherwise local.
pub fn classify_connection(name: &str) -> ConnectionType {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        ConnectionType::Unknown
    } else if contains_any(&lower, USB_TOKENS) {
        ConnectionType::Usb
    } else if contains_any(&lower, WIFI_TOKENS) {
        ConnectionType::Wifi
    } else if lower.starts_with(r"\\") || lower.contains("shared") {
        ConnectionType::Network
    } else if contains_any(&lower, VIRTUAL_TOKENS) {
        ConnectionType::Virtual
    } else {
        ConnectionType::Local
    }
}

/// Classify the printer type from a printer name
pub fn classify_type(name: &str) -> PrinterType {
    let lower = name.to_lowercase();
    if contains_any(&lower, THERMAL_TOKENS) {
        PrinterType::Thermal
    } else if contains_any(&lower, VIRTUAL_TOKENS) {
        PrinterType::Virtual
    } else {
        PrinterType::Standard
    }
}

/// Key used for de-duplication
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trim, drop blanks and remove duplicates, keeping first occurrence order
pub fn dedup_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(normalize_name(n)))
        .collect()
}

/// Default first, then thermal, then case-insensitive by name
pub fn sort_printers(printers: &mut [Printer]) {
    printers.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| {
                let at = a.printer_type == PrinterType::Thermal;
                let bt = b.printer_type == PrinterType::Thermal;
                bt.cmp(&at)
            })
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

// === Auto default ===

/// Known thermal model name patterns, in priority order
pub const THERMAL_MODEL_PATTERNS: &[&str] = &[
    r"(?i)^pos ?58(?:\(2\))?$",
    r"(?i)pos[- ]?58",
    r"(?i)58mm",
];

static THERMAL_MODELS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    THERMAL_MODEL_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok().map(|re| (re, *p)))
        .collect()
});

/// Why a default was adopted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoDefault {
    Single(String),
    Pattern { name: String, pattern: &'static str },
}

impl AutoDefault {
    pub fn name(&self) -> &str {
        match self {
            AutoDefault::Single(name) => name,
            AutoDefault::Pattern { name, .. } => name,
        }
    }
}

/// Pick a default from discovered names without touching any state
///
/// Exactly one printer ⇒ that one; otherwise the first pattern (in order)
/// that matches any name, taking the first matching name.
pub fn choose_default(names: &[String]) -> Option<AutoDefault> {
    if let [only] = names {
        return Some(AutoDefault::Single(only.clone()));
    }
    THERMAL_MODELS.iter().find_map(|(re, pattern)| {
        names
            .iter()
            .find(|n| re.is_match(n))
            .map(|name| AutoDefault::Pattern {
                name: name.clone(),
                pattern: *pattern,
            })
    })
}

// === Resolution ===

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NoPrinters,
    /// Several printers and no default; carries the candidates
    Ambiguous(Vec<String>),
}

/// explicit → configured default → the only discovered printer
pub fn resolve_from(
    explicit: Option<&str>,
    config: &PrinterConfig,
    discovered: &[String],
) -> Result<String, ResolveError> {
    let chosen = explicit
        .filter(|s| !s.trim().is_empty())
        .or(config.default_printer.as_deref().filter(|s| !s.trim().is_empty()));
    if let Some(name) = chosen {
        return Ok(name.to_string());
    }
    match discovered {
        [] => Err(ResolveError::NoPrinters),
        [only] => Ok(only.clone()),
        many => Err(ResolveError::Ambiguous(many.to_vec())),
    }
}

// === Directory ===

pub struct PrinterDirectory {
    backend: Arc<dyn PrintBackend>,
    log: DiagnosticLog,
}

impl PrinterDirectory {
    pub fn new(backend: Arc<dyn PrintBackend>, log: DiagnosticLog) -> Self {
        Self { backend, log }
    }

    /// Discover printer names
    ///
    /// Management query first, generic enumeration when it fails or finds
    /// nothing; both failing degrades to an empty list.
    #[instrument(skip(self))]
    pub async fn discover_names(&self) -> Vec<String> {
        match self.backend.list_printers().await {
            Ok(names) if !names.is_empty() => return dedup_names(names),
            Ok(_) => {}
            Err(e) => self.log.append(format!("ENUM_PRIMARY_ERROR: {}", e)),
        }

        match self.backend.enumerate_printers().await {
            Ok(names) => dedup_names(names),
            Err(e) => {
                self.log.append(format!("ENUM_FALLBACK_ERROR: {}", e));
                Vec::new()
            }
        }
    }

    /// Live status for one printer
    pub async fn status(&self, name: &str) -> StatusInfo {
        match self.backend.printer_status(name).await {
            Ok(StatusReport::Code(code)) => {
                let (status, connected) = PrinterStatus::from_code(code);
                StatusInfo {
                    status,
                    connected,
                    status_code: Some(code),
                }
            }
            Ok(StatusReport::Unsupported) | Ok(StatusReport::Unreadable) => {
                StatusInfo::unknown(true)
            }
            Err(e) => {
                tracing::debug!(printer = name, error = %e, "Status query failed");
                StatusInfo::unknown(false)
            }
        }
    }

    /// Full directory listing, sorted for display
    pub async fn list(&self, config: &PrinterConfig) -> Vec<Printer> {
        let names = self.discover_names().await;
        let mut printers = Vec::with_capacity(names.len());
        for name in names {
            let info = self.status(&name).await;
            printers.push(Printer {
                connection_type: classify_connection(&name),
                printer_type: classify_type(&name),
                is_default: config.default_printer.as_deref() == Some(name.as_str()),
                status: info.status,
                connected: info.connected,
                name,
            });
        }
        sort_printers(&mut printers);
        printers
    }

    /// Adopt a default printer if none is configured
    ///
    /// No-op when a default exists. Adoption is persisted immediately.
    pub async fn auto_assign_default(
        &self,
        store: &ConfigStore,
    ) -> StoreResult<Arc<PrinterConfig>> {
        let current = store.snapshot();
        if current.default_printer.is_some() {
            return Ok(current);
        }

        let names = self.discover_names().await;
        let Some(choice) = choose_default(&names) else {
            return Ok(current);
        };

        let name = choice.name().to_string();
        let updated = store
            .update(|cfg| {
                if cfg.default_printer.is_none() {
                    cfg.default_printer = Some(name.clone());
                }
            })
            .await?;

        match &choice {
            AutoDefault::Single(name) => {
                self.log
                    .append(format!("AUTO_PRINTER_SINGLE: set defaultPrinter='{}'", name));
            }
            AutoDefault::Pattern { name, pattern } => self.log.append(format!(
                "AUTO_PRINTER_PATTERN: set defaultPrinter='{}' using pattern {}",
                name, pattern
            )),
        }
        info!(printer = choice.name(), "Default printer auto-assigned");
        Ok(updated)
    }

    /// Resolve a target printer for ad-hoc printing
    pub async fn resolve(
        &self,
        explicit: Option<&str>,
        config: &PrinterConfig,
    ) -> Result<String, ResolveError> {
        if let Ok(name) = resolve_from(explicit, config, &[]) {
            return Ok(name);
        }
        let names = self.discover_names().await;
        resolve_from(None, config, &names)
    }
}
