//! 健康检查与诊断路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /health | GET | 连通性检查 |
//! | /diagnostics | GET | 运行时标志 (无敏感数据) |
//! | /logs | GET | print_backend.log 尾部 |

use axum::{Json, Router, extract::State, routing::get};
use pos_printer::BackendKind;
use serde::Serialize;

use crate::core::ServerState;
use crate::diagnostics::TAIL_CHARS;
use crate::utils::AppResult;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/diagnostics", get(diagnostics))
        .route("/logs", get(logs))
}

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    platform: &'static str,
    arch: &'static str,
    use_raw: bool,
    backend: BackendKind,
    verbose: bool,
    pid: u32,
    cwd: String,
    version: &'static str,
}

async fn diagnostics(State(state): State<ServerState>) -> Json<DiagnosticsResponse> {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    Json(DiagnosticsResponse {
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        use_raw: state.config.use_raw,
        backend: state.backend.kind(),
        verbose: state.config.verbose,
        pid: std::process::id(),
        cwd,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct LogsResponse {
    log: String,
}

async fn logs(State(state): State<ServerState>) -> AppResult<Json<LogsResponse>> {
    let log = state.log.tail(TAIL_CHARS).await?;
    Ok(Json(LogsResponse { log }))
}
