//! 统一错误处理
//!
//! Application error type for HTTP handlers:
//! - [`AppError`] - error enum mapped onto HTTP status codes
//!
//! # Status mapping
//!
//! | Variant | Status | Body |
//! |---------|--------|------|
//! | Validation | 400 | `{error}` |
//! | PrinterResolution | 400 | `{error, availablePrinters?}` |
//! | PrintFailed | 500 | `{error, usedPrinter?}` |
//! | Internal | 500 | `{error}` |

use axum::{
    Json,
    extract::rejection::JsonRejection,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pos_printer::PrintError;
use serde::Serialize;
use tracing::error;

use crate::directory::ResolveError;
use crate::dispatch::DispatchError;
use crate::store::StoreError;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or malformed request field (400)
    #[error("{0}")]
    Validation(String),

    /// No printer could be chosen (400)
    #[error("{message}")]
    PrinterResolution {
        message: String,
        available: Option<Vec<String>>,
    },

    /// The OS print path failed (500)
    #[error("{message}")]
    PrintFailed {
        message: String,
        used_printer: Option<String>,
    },

    /// Anything else (500)
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::PrinterResolution { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::PrintFailed { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Map a printer resolution failure using the caller's wording
    pub fn from_resolution(err: ResolveError, none_msg: &str, ambiguous_msg: &str) -> Self {
        match err {
            ResolveError::NoPrinters => AppError::PrinterResolution {
                message: none_msg.to_string(),
                available: None,
            },
            ResolveError::Ambiguous(names) => AppError::PrinterResolution {
                message: ambiguous_msg.to_string(),
                available: Some(names),
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available_printers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    used_printer: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let message = self.to_string();
        let (available_printers, used_printer) = match self {
            AppError::PrinterResolution { available, .. } => (available, None),
            AppError::PrintFailed { used_printer, .. } => (None, used_printer),
            _ => (None, None),
        };

        let body = ErrorBody {
            error: message,
            available_printers,
            used_printer,
        };

        (status, Json(body)).into_response()
    }
}

impl From<PrintError> for AppError {
    fn from(err: PrintError) -> Self {
        AppError::PrintFailed {
            message: err.to_string(),
            used_printer: None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(err.body_text())
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => AppError::Validation(msg),
            DispatchError::Resolution(e) => AppError::from_resolution(
                e,
                "No printers detected. Install a printer or configure defaultPrinter in config.json.",
                "Multiple printers found; set defaultPrinter via /set-default.",
            ),
            DispatchError::Exhausted { source, printer } => AppError::PrintFailed {
                message: source.to_string(),
                used_printer: Some(printer),
            },
            DispatchError::Direct { source, printer } => AppError::PrintFailed {
                message: source.to_string(),
                used_printer: Some(printer),
            },
            DispatchError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// 处理器的 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
