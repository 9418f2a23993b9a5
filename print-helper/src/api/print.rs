//! 打印路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /print-text | POST | 纯文本直接打印 (无回退) |
//! | /print-pdf | POST | multipart 上传 PDF 直接打印 (无回退) |
//! | /print-invoice | POST | 发票完整回退链: PDF → 文本 → ESC/POS |

use axum::{
    Json, Router,
    extract::{
        Multipart, State,
        multipart::MultipartRejection,
        rejection::JsonRejection,
    },
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::ServerState;
use crate::dispatch::{DirectKind, DispatchError, PrintMode};
use crate::render::Invoice;
use crate::utils::{AppError, AppResult};

const NO_PRINTERS: &str = "No printers found. Please install or configure a default printer.";
const NO_DEFAULT: &str = "No default printer configured. Use /set-default or set config.json defaultPrinter.";

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/print-text", post(print_text))
        .route("/print-pdf", post(print_pdf))
        .route("/print-invoice", post(print_invoice))
}

/// Resolution wording for the ad-hoc endpoints
fn direct_error(err: DispatchError) -> AppError {
    match err {
        DispatchError::Resolution(e) => AppError::from_resolution(e, NO_PRINTERS, NO_DEFAULT),
        other => other.into(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintedResponse {
    status: &'static str,
    used_printer: String,
}

#[derive(Debug, Deserialize)]
pub struct PrintTextRequest {
    #[serde(default)]
    printer: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    settings: Option<Map<String, Value>>,
}

/// POST /print-text
async fn print_text(
    State(state): State<ServerState>,
    payload: Result<Json<PrintTextRequest>, JsonRejection>,
) -> AppResult<Json<PrintedResponse>> {
    let Json(req) = payload?;
    let text = req
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("text required"))?;

    let used_printer = state
        .dispatcher
        .print_direct(
            DirectKind::Text,
            text.as_bytes(),
            req.printer.as_deref(),
            req.settings.as_ref(),
        )
        .await
        .map_err(direct_error)?;

    Ok(Json(PrintedResponse {
        status: "ok",
        used_printer,
    }))
}

/// POST /print-pdf (multipart: `file`, optional `printer`)
async fn print_pdf(
    State(state): State<ServerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<PrintedResponse>> {
    let mut multipart = multipart.map_err(|_| AppError::validation("file field required"))?;

    let mut file = None;
    let mut printer = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => file = Some(field.bytes().await?),
            "printer" => printer = Some(field.text().await?),
            _ => {}
        }
    }
    let file = file.ok_or_else(|| AppError::validation("file field required"))?;

    let used_printer = state
        .dispatcher
        .print_direct(DirectKind::Pdf, &file, printer.as_deref(), None)
        .await
        .map_err(direct_error)?;

    Ok(Json(PrintedResponse {
        status: "ok",
        used_printer,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PrintInvoiceRequest {
    #[serde(default)]
    invoice: Option<Value>,
    #[serde(default)]
    printer: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintInvoiceResponse {
    status: &'static str,
    message: &'static str,
    used_printer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback: Option<PrintMode>,
}

/// Validate the raw payload before parsing it leniently
fn parse_invoice(value: Option<Value>) -> Result<Invoice, AppError> {
    let value = value
        .filter(Value::is_object)
        .ok_or_else(|| AppError::validation("invoice object required"))?;

    let has_lines = value
        .get("lines")
        .and_then(Value::as_array)
        .is_some_and(|lines| !lines.is_empty());
    if !has_lines {
        return Err(AppError::validation("invoice.lines required"));
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::validation(format!("invalid invoice: {}", e)))
}

/// POST /print-invoice
async fn print_invoice(
    State(state): State<ServerState>,
    payload: Result<Json<PrintInvoiceRequest>, JsonRejection>,
) -> AppResult<Json<PrintInvoiceResponse>> {
    let Json(req) = payload?;
    let invoice = parse_invoice(req.invoice)?;

    let outcome = state
        .dispatcher
        .print_invoice(&invoice, req.printer.as_deref())
        .await?;

    Ok(Json(PrintInvoiceResponse {
        status: "ok",
        message: outcome.mode.message(),
        used_printer: outcome.printer,
        fallback: outcome.mode.fallback(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_invoice_validation() {
        let missing = parse_invoice(None).unwrap_err();
        assert_eq!(missing.to_string(), "invoice object required");

        let not_object = parse_invoice(Some(json!("INV-1"))).unwrap_err();
        assert_eq!(not_object.to_string(), "invoice object required");

        let no_lines = parse_invoice(Some(json!({ "grandTotal": 3 }))).unwrap_err();
        assert_eq!(no_lines.to_string(), "invoice.lines required");

        let empty = parse_invoice(Some(json!({ "lines": [] }))).unwrap_err();
        assert_eq!(empty.to_string(), "invoice.lines required");

        let ok = parse_invoice(Some(json!({ "lines": [{ "name": "Tea" }] }))).unwrap();
        assert_eq!(ok.lines.len(), 1);
    }
}
