//! Shell-command backend
//!
//! Windows: PowerShell management cmdlets, SumatraPDF for PDF submission,
//! `print` and `copy /b` through cmd.
//! Elsewhere: CUPS command line tools (`lpstat`, `lp`, `lpr`).

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, instrument};

use crate::backend::{BackendKind, BackendTimeouts, PrintBackend, PrintOptions, StatusReport};
use crate::command::{CommandOutput, collapse_whitespace, run_hidden};
use crate::error::{PrintError, PrintResult};

/// Command dialect used by [`ShellBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    Windows,
    Cups,
}

impl ShellFlavor {
    /// Dialect of the running platform
    pub fn current() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Cups }
    }
}

/// A fully prepared command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }
}

/// Shell-command backend
#[derive(Debug, Clone)]
pub struct ShellBackend {
    flavor: ShellFlavor,
    timeouts: BackendTimeouts,
    pdf_tool: String,
}

impl ShellBackend {
    pub fn new() -> Self {
        Self::with_flavor(ShellFlavor::current())
    }

    pub fn with_flavor(flavor: ShellFlavor) -> Self {
        Self {
            flavor,
            timeouts: BackendTimeouts::default(),
            pdf_tool: "SumatraPDF.exe".to_string(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: BackendTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override the PDF print tool used on Windows
    pub fn with_pdf_tool(mut self, tool: impl Into<String>) -> Self {
        self.pdf_tool = tool.into();
        self
    }

    pub fn flavor(&self) -> ShellFlavor {
        self.flavor
    }

    pub fn timeouts(&self) -> BackendTimeouts {
        self.timeouts
    }

    // === Command lines ===

    pub fn list_invocation(&self) -> Invocation {
        match self.flavor {
            ShellFlavor::Windows => powershell(
                "Get-Printer | Select-Object -ExpandProperty Name | ConvertTo-Json",
            ),
            ShellFlavor::Cups => Invocation::new("lpstat", vec!["-e".into()]),
        }
    }

    pub fn enumerate_invocation(&self) -> Invocation {
        match self.flavor {
            ShellFlavor::Windows => powershell(
                "Get-CimInstance -ClassName Win32_Printer | Select-Object -ExpandProperty Name | ConvertTo-Json",
            ),
            ShellFlavor::Cups => Invocation::new("lpstat", vec!["-a".into()]),
        }
    }

    pub fn status_invocation(&self, name: &str) -> Invocation {
        match self.flavor {
            ShellFlavor::Windows => powershell(&format!(
                "Get-Printer -Name '{}' | Select-Object -Property PrinterStatus,DeviceType | ConvertTo-Json",
                ps_quote(name)
            )),
            ShellFlavor::Cups => Invocation::new("lpstat", vec!["-p".into(), name.into()]),
        }
    }

    pub fn submit_invocation(&self, path: &Path, options: &PrintOptions) -> Invocation {
        let file = path.to_string_lossy().into_owned();
        match self.flavor {
            ShellFlavor::Windows if is_pdf(path) => {
                let mut args = vec!["-print-to".into(), options.printer.clone(), "-silent".into()];
                let mut settings = Vec::new();
                if let Some(mono) = options.monochrome {
                    settings.push(if mono { "monochrome" } else { "color" }.to_string());
                }
                if let Some(copies) = options.copies {
                    settings.push(format!("{}x", copies));
                }
                if !settings.is_empty() {
                    args.push("-print-settings".into());
                    args.push(settings.join(","));
                }
                args.push(file);
                Invocation::new(&self.pdf_tool, args)
            }
            ShellFlavor::Windows => {
                let copies = options.copies.unwrap_or(1);
                powershell(&format!(
                    "$t = Get-Content -LiteralPath '{}' -Raw; 1..{} | ForEach-Object {{ $t | Out-Printer -Name '{}' }}",
                    ps_quote(&file),
                    copies,
                    ps_quote(&options.printer)
                ))
            }
            ShellFlavor::Cups => {
                let mut args = vec!["-d".into(), options.printer.clone()];
                if let Some(copies) = options.copies {
                    args.push("-n".into());
                    args.push(copies.to_string());
                }
                if options.monochrome == Some(true) {
                    args.push("-o".into());
                    args.push("print-color-mode=monochrome".into());
                }
                args.push(file);
                Invocation::new("lp", args)
            }
        }
    }

    pub fn legacy_invocation(&self, printer: &str, path: &Path) -> Invocation {
        let file = path.to_string_lossy().into_owned();
        match self.flavor {
            // print.exe cannot take a quoted device inside /D:
            ShellFlavor::Windows => Invocation::new(
                "cmd.exe",
                vec![
                    "/c".into(),
                    "print".into(),
                    format!("/D:{}", collapse_whitespace(printer)),
                    file,
                ],
            ),
            ShellFlavor::Cups => Invocation::new("lpr", vec!["-P".into(), printer.into(), file]),
        }
    }

    pub fn raw_invocation(&self, path: &Path, share: &str) -> Invocation {
        let file = path.to_string_lossy().into_owned();
        match self.flavor {
            ShellFlavor::Windows => Invocation::new(
                "cmd.exe",
                vec![
                    "/c".into(),
                    "copy".into(),
                    "/b".into(),
                    file,
                    format!(r"\\localhost\{}", share),
                ],
            ),
            ShellFlavor::Cups => Invocation::new(
                "lp",
                vec!["-d".into(), share.into(), "-o".into(), "raw".into(), file],
            ),
        }
    }

    // === Output parsing ===

    fn parse_names(&self, stdout: &str, from_enumerate: bool) -> PrintResult<Vec<String>> {
        match self.flavor {
            ShellFlavor::Windows => parse_name_json(stdout),
            ShellFlavor::Cups if from_enumerate => Ok(parse_first_tokens(stdout)),
            ShellFlavor::Cups => Ok(parse_lines(stdout)),
        }
    }

    async fn run(&self, inv: Invocation, timeout: Option<std::time::Duration>) -> PrintResult<CommandOutput> {
        run_hidden(&inv.program, &inv.args, timeout).await
    }
}

impl Default for ShellBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrintBackend for ShellBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Shell
    }

    #[instrument(skip(self))]
    async fn list_printers(&self) -> PrintResult<Vec<String>> {
        let out = self
            .run(self.list_invocation(), Some(self.timeouts.enumeration))
            .await?;
        self.parse_names(&out.stdout, false)
    }

    #[instrument(skip(self))]
    async fn enumerate_printers(&self) -> PrintResult<Vec<String>> {
        let out = self
            .run(self.enumerate_invocation(), Some(self.timeouts.enumeration))
            .await?;
        self.parse_names(&out.stdout, true)
    }

    #[instrument(skip(self))]
    async fn printer_status(&self, name: &str) -> PrintResult<StatusReport> {
        let out = self
            .run(self.status_invocation(name), Some(self.timeouts.status))
            .await?;
        Ok(match self.flavor {
            ShellFlavor::Windows => parse_status_json(&out.stdout),
            ShellFlavor::Cups => parse_lpstat_status(&out.stdout),
        })
    }

    #[instrument(skip(self, options), fields(printer = %options.printer))]
    async fn submit_document(&self, path: &Path, options: &PrintOptions) -> PrintResult<()> {
        self.run(self.submit_invocation(path, options), None).await?;
        info!("Document handed to spooler");
        Ok(())
    }

    fn supports_legacy_print(&self) -> bool {
        true
    }

    #[instrument(skip(self))]
    async fn legacy_print(&self, printer: &str, path: &Path) -> PrintResult<CommandOutput> {
        self.run(
            self.legacy_invocation(printer, path),
            Some(self.timeouts.command),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn copy_raw(&self, path: &Path, share: &str) -> PrintResult<CommandOutput> {
        self.run(self.raw_invocation(path, share), Some(self.timeouts.command))
            .await
    }
}

fn powershell(script: &str) -> Invocation {
    Invocation::new(
        "powershell.exe",
        vec![
            "-NoProfile".into(),
            "-NonInteractive".into(),
            "-Command".into(),
            script.into(),
        ],
    )
}

/// Escape a value for a single-quoted PowerShell string
fn ps_quote(s: &str) -> String {
    s.replace('\'', "''")
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Parse `ConvertTo-Json` output of a name list
///
/// PowerShell emits a bare string for one result, an array for several and
/// nothing at all for none.
pub fn parse_name_json(stdout: &str) -> PrintResult<Vec<String>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| PrintError::Parse(e.to_string()))?;
    let names = match value {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Object(map) => map.get("Name").and_then(Value::as_str).map(String::from),
                _ => None,
            })
            .collect(),
        Value::Null => Vec::new(),
        other => return Err(PrintError::Parse(format!("unexpected JSON: {}", other))),
    };
    Ok(names)
}

fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn parse_first_tokens(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .map(String::from)
        .collect()
}

/// Parse `Get-Printer | Select PrinterStatus | ConvertTo-Json`
pub fn parse_status_json(stdout: &str) -> StatusReport {
    let Ok(value) = serde_json::from_str::<Value>(stdout.trim()) else {
        return StatusReport::Unreadable;
    };
    match value.get("PrinterStatus") {
        Some(code) => code
            .as_u64()
            .and_then(|c| u32::try_from(c).ok())
            .map(StatusReport::Code)
            .unwrap_or(StatusReport::Unreadable),
        // Missing field reads as "Normal"
        None if value.is_object() => StatusReport::Code(0),
        None => StatusReport::Unreadable,
    }
}

/// Parse `lpstat -p <name>` into the `PrinterStatus` code numbering
pub fn parse_lpstat_status(stdout: &str) -> StatusReport {
    let text = stdout.to_ascii_lowercase();
    if text.contains("disabled") {
        StatusReport::Code(1)
    } else if text.contains("now printing") {
        StatusReport::Code(11)
    } else if text.contains("is idle") {
        StatusReport::Code(0)
    } else {
        StatusReport::Unreadable
    }
}
