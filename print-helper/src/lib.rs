//! Print Helper - 本地打印助手服务
//!
//! # 架构概述
//!
//! A long-running local process that accepts receipt/invoice data over HTTP
//! and gets it onto thermal or office printers:
//!
//! - **配置存储** (`store`): `config.json` with default printer, settings, raw share
//! - **打印机目录** (`directory`): discovery, classification, live status, auto default
//! - **渲染引擎** (`render`): invoice → PDF / plain text / ESC/POS
//! - **打印调度** (`dispatch`): printer resolution and the fallback chain
//! - **诊断日志** (`diagnostics`): append-only `print_backend.log`
//! - **HTTP API** (`api`): axum routes
//!
//! Platform printing itself (enumeration, status, submission) lives in the
//! `pos-printer` crate behind `PrintBackend`.
//!
//! # 模块结构
//!
//! ```text
//! print-helper/src/
//! ├── core/          # 配置、状态、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── render/        # 发票渲染 (pdf / text / escpos)
//! ├── utils/         # 错误类型、日志初始化
//! ├── store.rs       # config.json
//! ├── directory.rs   # 打印机目录
//! ├── dispatch.rs    # 回退链
//! └── diagnostics.rs # print_backend.log
//! ```

pub mod api;
pub mod core;
pub mod diagnostics;
pub mod directory;
pub mod dispatch;
pub mod render;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState, build_app};
pub use diagnostics::DiagnosticLog;
pub use directory::{Printer, PrinterDirectory, ResolveError};
pub use dispatch::{DispatchError, Dispatcher, PrintMode, PrintOutcome};
pub use render::{Invoice, InvoiceLine};
pub use store::{ConfigStore, PrinterConfig};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::init_logger_with_file;

pub fn print_banner() {
    println!(
        r#"
    ____       _       __     __  __     __
   / __ \_____(_)___  / /_   / / / /__  / /___  ___  _____
  / /_/ / ___/ / __ \/ __/  / /_/ / _ \/ / __ \/ _ \/ ___/
 / ____/ /  / / / / / /_   / __  /  __/ / /_/ /  __/ /
/_/   /_/  /_/_/ /_/\__/  /_/ /_/\___/_/ .___/\___/_/
                                      /_/
    "#
    );
}
