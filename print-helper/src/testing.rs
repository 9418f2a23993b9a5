//! Scripted [`PrintBackend`] for tests
//!
//! Every call is recorded; failures are switched on per operation so each
//! dispatcher and directory branch can be driven deterministically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use pos_printer::{
    BackendKind, CommandOutput, PrintBackend, PrintError, PrintOptions, PrintResult, StatusReport,
};

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    List,
    Enumerate,
    Status(String),
    Submit { path: PathBuf, options: PrintOptions },
    Legacy { printer: String, path: PathBuf },
    Raw { path: PathBuf, share: String },
}

#[derive(Debug, Default)]
struct FakeState {
    printers: Vec<String>,
    enumerated: Option<Vec<String>>,
    list_fails: bool,
    enumerate_fails: bool,
    statuses: HashMap<String, StatusReport>,
    status_fails: Vec<String>,
    submit_fails: bool,
    legacy_fails: bool,
    raw_fails: bool,
    no_legacy: bool,
    calls: Vec<BackendCall>,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn command_failure(program: &str, stderr: &str) -> PrintError {
    PrintError::Command {
        program: program.to_string(),
        code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_printers(mut self, names: &[&str]) -> Self {
        self.state.get_mut().printers = owned(names);
        self
    }

    /// Names returned by the generic enumeration only
    pub fn with_enumerated(mut self, names: &[&str]) -> Self {
        self.state.get_mut().enumerated = Some(owned(names));
        self
    }

    pub fn with_list_failure(mut self) -> Self {
        self.state.get_mut().list_fails = true;
        self
    }

    pub fn with_enumerate_failure(mut self) -> Self {
        self.state.get_mut().enumerate_fails = true;
        self
    }

    pub fn with_status(mut self, name: &str, report: StatusReport) -> Self {
        self.state.get_mut().statuses.insert(name.to_string(), report);
        self
    }

    pub fn with_status_failure(mut self, name: &str) -> Self {
        self.state.get_mut().status_fails.push(name.to_string());
        self
    }

    pub fn with_submit_failure(mut self) -> Self {
        self.state.get_mut().submit_fails = true;
        self
    }

    pub fn with_legacy_failure(mut self) -> Self {
        self.state.get_mut().legacy_fails = true;
        self
    }

    pub fn with_raw_failure(mut self) -> Self {
        self.state.get_mut().raw_fails = true;
        self
    }

    pub fn without_legacy_print(mut self) -> Self {
        self.state.get_mut().no_legacy = true;
        self
    }

    pub fn set_printers(&self, names: &[&str]) {
        self.state.lock().printers = owned(names);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl PrintBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Custom
    }

    async fn list_printers(&self) -> PrintResult<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::List);
        if state.list_fails {
            return Err(PrintError::Timeout("Get-Printer".into()));
        }
        Ok(state.printers.clone())
    }

    async fn enumerate_printers(&self) -> PrintResult<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Enumerate);
        if state.enumerate_fails {
            return Err(command_failure("fake-enum", "spooler unavailable"));
        }
        Ok(state
            .enumerated
            .clone()
            .unwrap_or_else(|| state.printers.clone()))
    }

    async fn printer_status(&self, name: &str) -> PrintResult<StatusReport> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Status(name.to_string()));
        if state.status_fails.iter().any(|n| n == name) {
            return Err(PrintError::Timeout(format!("status {}", name)));
        }
        Ok(state
            .statuses
            .get(name)
            .copied()
            .unwrap_or(StatusReport::Code(0)))
    }

    async fn submit_document(&self, path: &Path, options: &PrintOptions) -> PrintResult<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Submit {
            path: path.to_path_buf(),
            options: options.clone(),
        });
        if state.submit_fails {
            return Err(command_failure("fake-submit", "spooler rejected job"));
        }
        Ok(())
    }

    fn supports_legacy_print(&self) -> bool {
        !self.state.lock().no_legacy
    }

    async fn legacy_print(&self, printer: &str, path: &Path) -> PrintResult<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Legacy {
            printer: printer.to_string(),
            path: path.to_path_buf(),
        });
        if state.legacy_fails {
            return Err(command_failure("fake-print", "Unable to initialize device"));
        }
        Ok(CommandOutput {
            code: Some(0),
            stdout: format!("{} is currently being printed", path.display()),
            stderr: String::new(),
        })
    }

    async fn copy_raw(&self, path: &Path, share: &str) -> PrintResult<CommandOutput> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Raw {
            path: path.to_path_buf(),
            share: share.to_string(),
        });
        if state.raw_fails {
            return Err(command_failure("fake-copy", "The network name cannot be found."));
        }
        Ok(CommandOutput {
            code: Some(0),
            stdout: "1 file(s) copied.".into(),
            stderr: String::new(),
        })
    }
}
