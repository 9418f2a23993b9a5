//! 打印机目录路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /printers | GET | 带分类与实时状态的打印机列表 |
//! | /debug-printers | GET | 仅名称 (同时写入诊断日志) |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::directory::Printer;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/printers", get(list))
        .route("/debug-printers", get(debug_names))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintersResponse {
    printers: Vec<Printer>,
    default_printer: Option<String>,
    count: usize,
}

/// GET /printers
///
/// Sorted default first, then thermal, then by name. An empty list is a
/// normal answer when enumeration finds nothing.
async fn list(State(state): State<ServerState>) -> Json<PrintersResponse> {
    let config = state.store.snapshot();
    let printers = state.directory.list(&config).await;
    Json(PrintersResponse {
        count: printers.len(),
        default_printer: config.default_printer.clone(),
        printers,
    })
}

#[derive(Serialize)]
pub struct DebugPrintersResponse {
    printers: Vec<String>,
}

/// GET /debug-printers
async fn debug_names(State(state): State<ServerState>) -> Json<DebugPrintersResponse> {
    let printers = state.directory.discover_names().await;
    state.log.append(format!(
        "DEBUG_PRINTERS names={}",
        serde_json::to_string(&printers).unwrap_or_default()
    ));
    Json(DebugPrintersResponse { printers })
}
