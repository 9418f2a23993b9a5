//! 核心模块 - 进程配置、状态和服务器
//!
//! # 模块结构
//!
//! - [`Config`] - 进程配置 (环境变量)
//! - [`ServerState`] - 服务器状态
//! - [`Server`] - HTTP 服务器

pub mod config;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::{Server, build_app};
pub use state::ServerState;
