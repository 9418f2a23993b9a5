//! Windows spooler backend
//!
//! Uses the Win32 print spooler for enumeration, status and raw delivery.
//! PDF and legacy text submission need a rasterizing tool, so those calls are
//! delegated to the wrapped [`ShellBackend`].

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use crate::backend::{
    BackendKind, BackendTimeouts, PrintBackend, PrintOptions, StatusReport,
    status_code_from_flags,
};
use crate::command::{CommandOutput, run_blocking};
use crate::error::{PrintError, PrintResult};
use crate::shell::ShellBackend;

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// List installed printers (local and connections) via `EnumPrintersW`
pub fn enum_printers() -> PrintResult<Vec<String>> {
    use windows::Win32::Graphics::Printing::{
        EnumPrintersW, PRINTER_ENUM_CONNECTIONS, PRINTER_ENUM_LOCAL, PRINTER_INFO_4W,
    };
    use windows::core::PWSTR;

    unsafe {
        let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;
        let mut needed: u32 = 0;
        let mut returned: u32 = 0;

        let _ = EnumPrintersW(flags, None, 4, None, &mut needed, &mut returned);

        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        EnumPrintersW(
            flags,
            None,
            4,
            Some(buf.as_mut_slice()),
            &mut needed,
            &mut returned,
        )
        .map_err(|_| PrintError::WindowsPrinter("EnumPrintersW failed".to_string()))?;

        let ptr = buf.as_ptr() as *const PRINTER_INFO_4W;
        let slice = std::slice::from_raw_parts(ptr, returned as usize);

        Ok(slice
            .iter()
            .filter(|info| !info.pPrinterName.is_null())
            .filter_map(|info| PWSTR(info.pPrinterName.0).to_string().ok())
            .collect())
    }
}

/// Read the spooler status bitmask (`PRINTER_INFO_6.dwStatus`)
pub fn status_flags(name: &str) -> PrintResult<u32> {
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, GetPrinterW, OpenPrinterW, PRINTER_HANDLE, PRINTER_INFO_6,
    };
    use windows::core::PCWSTR;

    unsafe {
        let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
        let name_w = to_wide(name);

        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
            .map_err(|_| PrintError::WindowsPrinter(format!("OpenPrinterW failed: {}", name)))?;

        let mut needed: u32 = 0;
        let _ = GetPrinterW(handle, 6, None, &mut needed);

        let mut flags = None;
        if needed > 0 {
            let mut buf: Vec<u8> = vec![0; needed as usize];
            if GetPrinterW(handle, 6, Some(buf.as_mut_slice()), &mut needed).is_ok() {
                let info = std::ptr::read_unaligned(buf.as_ptr() as *const PRINTER_INFO_6);
                flags = Some(info.dwStatus);
            }
        }

        let _ = ClosePrinter(handle);

        flags.ok_or_else(|| PrintError::WindowsPrinter("GetPrinterW level 6 failed".to_string()))
    }
}

/// Write a RAW document to a printer through the spooler
pub fn write_raw(printer: &str, data: &[u8]) -> PrintResult<()> {
    use core::ffi::c_void;
    use windows::Win32::Graphics::Printing::{
        ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, OpenPrinterW, PRINTER_HANDLE,
        StartDocPrinterW, StartPagePrinter, WritePrinter,
    };
    use windows::core::{PCWSTR, PWSTR};

    unsafe {
        let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
        let name_w = to_wide(printer);

        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
            .map_err(|_| PrintError::WindowsPrinter(format!("OpenPrinterW failed: {}", printer)))?;

        let doc_name_w = to_wide("Invoice (ESC/POS)");
        let datatype_w = to_wide("RAW");
        let doc_info = DOC_INFO_1W {
            pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
            pOutputFile: PWSTR::null(),
            pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
        };

        if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
            let _ = ClosePrinter(handle);
            return Err(PrintError::WindowsPrinter(
                "StartDocPrinter failed".to_string(),
            ));
        }

        if !StartPagePrinter(handle).as_bool() {
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);
            return Err(PrintError::WindowsPrinter(
                "StartPagePrinter failed".to_string(),
            ));
        }

        let mut written: u32 = 0;
        let ok = WritePrinter(
            handle,
            data.as_ptr() as *const c_void,
            data.len() as u32,
            &mut written,
        );

        let _ = EndPagePrinter(handle);
        let _ = EndDocPrinter(handle);
        let _ = ClosePrinter(handle);

        if !ok.as_bool() {
            return Err(PrintError::WindowsPrinter(
                "WritePrinter failed".to_string(),
            ));
        }

        if written != data.len() as u32 {
            return Err(PrintError::WindowsPrinter("Incomplete write".to_string()));
        }

        Ok(())
    }
}

/// Spooler API backend
///
/// Enumeration and status use the wrapped shell's bounds; a stale network
/// connection can hold `OpenPrinterW` for minutes.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    shell: ShellBackend,
    timeouts: BackendTimeouts,
}

impl NativeBackend {
    pub fn new(shell: ShellBackend) -> Self {
        let timeouts = shell.timeouts();
        Self { shell, timeouts }
    }
}

#[async_trait]
impl PrintBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    /// Get-Printer stays the preferred query; the library listing is the fallback
    async fn list_printers(&self) -> PrintResult<Vec<String>> {
        self.shell.list_printers().await
    }

    #[instrument(skip(self))]
    async fn enumerate_printers(&self) -> PrintResult<Vec<String>> {
        run_blocking("EnumPrintersW", Some(self.timeouts.enumeration), enum_printers).await
    }

    #[instrument(skip(self))]
    async fn printer_status(&self, name: &str) -> PrintResult<StatusReport> {
        let name = name.to_string();
        let flags =
            run_blocking("GetPrinterW", Some(self.timeouts.status), move || status_flags(&name))
                .await?;
        Ok(StatusReport::Code(status_code_from_flags(flags)))
    }

    async fn submit_document(&self, path: &Path, options: &PrintOptions) -> PrintResult<()> {
        self.shell.submit_document(path, options).await
    }

    fn supports_legacy_print(&self) -> bool {
        self.shell.supports_legacy_print()
    }

    async fn legacy_print(&self, printer: &str, path: &Path) -> PrintResult<CommandOutput> {
        self.shell.legacy_print(printer, path).await
    }

    #[instrument(skip(self))]
    async fn copy_raw(&self, path: &Path, share: &str) -> PrintResult<CommandOutput> {
        let data = tokio::fs::read(path).await?;
        let target = format!(r"\\localhost\{}", share);
        let len = data.len();
        run_blocking("WritePrinter", Some(self.timeouts.command), move || {
            write_raw(&target, &data)
        })
        .await?;
        Ok(CommandOutput {
            code: Some(0),
            stdout: format!("{} bytes written", len),
            stderr: String::new(),
        })
    }
}
