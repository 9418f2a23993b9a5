//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查、诊断、日志尾部
//! - [`printers`] - 打印机目录
//! - [`config`] - 默认打印机与 raw share 配置
//! - [`print`] - 打印入口 (文本、PDF、发票)
//!
//! All errors are JSON `{ "error": ... }` bodies produced by
//! [`AppError`](crate::utils::AppError).

pub mod config;
pub mod health;
pub mod print;
pub mod printers;

use axum::Router;

use crate::core::ServerState;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(printers::router())
        .merge(config::router())
        .merge(print::router())
}
