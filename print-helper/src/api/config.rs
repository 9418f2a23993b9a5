//! 打印配置路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /config | GET | 当前 config.json |
//! | /set-default | POST | 设置默认打印机与提交参数 |
//! | /set-raw-share | POST | 设置/清除 ESC/POS 共享名 |

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ServerState;
use crate::store::PrinterConfig;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/set-default", post(set_default))
        .route("/set-raw-share", post(set_raw_share))
}

/// GET /config
///
/// Re-reads the file so hand edits show up without a restart.
async fn get_config(State(state): State<ServerState>) -> Json<PrinterConfig> {
    let config = state.store.reload().await;
    Json(config.as_ref().clone())
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultRequest {
    #[serde(default)]
    printer: Option<String>,
    #[serde(default)]
    settings: Option<Map<String, Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDefaultResponse {
    status: &'static str,
    default_printer: String,
}

/// POST /set-default
///
/// The printer must be in the current directory; settings are replaced
/// (omitted ⇒ `{}`).
async fn set_default(
    State(state): State<ServerState>,
    payload: Result<Json<SetDefaultRequest>, JsonRejection>,
) -> AppResult<Json<SetDefaultResponse>> {
    let Json(req) = payload?;
    let printer = req
        .printer
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::validation("printer required"))?;

    let names = state.directory.discover_names().await;
    if !names.contains(&printer) {
        return Err(AppError::PrinterResolution {
            message: format!("Printer '{}' not found", printer),
            available: Some(names),
        });
    }

    let settings = req.settings.unwrap_or_default();
    let chosen = printer.clone();
    state
        .store
        .update(move |cfg| {
            cfg.default_printer = Some(chosen);
            cfg.settings = settings;
        })
        .await?;
    state.log.append(format!("SET_DEFAULT printer={}", printer));

    Ok(Json(SetDefaultResponse {
        status: "ok",
        default_printer: printer,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetRawShareRequest {
    #[serde(default)]
    share: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRawShareResponse {
    status: &'static str,
    raw_share: Option<String>,
}

/// POST /set-raw-share
///
/// Empty or absent share clears it.
async fn set_raw_share(
    State(state): State<ServerState>,
    payload: Result<Json<SetRawShareRequest>, JsonRejection>,
) -> AppResult<Json<SetRawShareResponse>> {
    let Json(req) = payload?;
    let share = req
        .share
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let stored = share.clone();
    state.store.update(move |cfg| cfg.raw_share = stored).await?;
    state.log.append(format!(
        "SET_RAW_SHARE share={}",
        share.as_deref().unwrap_or("null")
    ));

    Ok(Json(SetRawShareResponse {
        status: "ok",
        raw_share: share,
    }))
}
