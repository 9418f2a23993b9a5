use std::sync::Arc;

use pos_printer::{PrintBackend, ShellBackend, probe_backend};

use crate::core::Config;
use crate::diagnostics::DiagnosticLog;
use crate::directory::PrinterDirectory;
use crate::dispatch::{DispatchSettings, Dispatcher};
use crate::store::ConfigStore;

/// 服务器状态 - 进程级单例
///
/// Built once at startup and cloned into every handler. All fields are
/// shared handles; the only mutable piece is the config snapshot inside
/// [`ConfigStore`].
///
/// | 字段 | 说明 |
/// |------|------|
/// | config | 进程配置 (不可变) |
/// | store | config.json 快照与写入 |
/// | backend | 平台打印能力 (探测选择) |
/// | directory | 打印机发现与状态 |
/// | dispatcher | 打印调度与回退链 |
/// | log | print_backend.log |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: Arc<ConfigStore>,
    pub backend: Arc<dyn PrintBackend>,
    pub directory: Arc<PrinterDirectory>,
    pub dispatcher: Arc<Dispatcher>,
    pub log: DiagnosticLog,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// Probes the platform backend, then wires everything on top of it.
    pub async fn initialize(config: &Config) -> Self {
        let shell = ShellBackend::new()
            .with_timeouts(config.backend_timeouts())
            .with_pdf_tool(config.pdf_tool.clone());
        let backend = probe_backend(config.backend, shell).await;
        Self::with_backend(config.clone(), backend)
    }

    /// Build state on an explicit backend (tests, embedding)
    pub fn with_backend(config: Config, backend: Arc<dyn PrintBackend>) -> Self {
        let log = DiagnosticLog::new(config.diagnostic_log_path());
        let store = Arc::new(ConfigStore::open(config.config_path()));
        let directory = Arc::new(PrinterDirectory::new(backend.clone(), log.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            backend.clone(),
            directory.clone(),
            store.clone(),
            log.clone(),
            DispatchSettings {
                artifact_dir: config.artifact_dir(),
                cleanup_delay: config.cleanup_delay(),
                print_delay: config.print_delay(),
                verbose: config.verbose,
            },
        ));

        Self {
            config: Arc::new(config),
            store,
            backend,
            directory,
            dispatcher,
            log,
        }
    }
}
