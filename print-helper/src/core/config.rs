use std::path::{Path, PathBuf};
use std::time::Duration;

use pos_printer::{BackendPreference, BackendTimeouts};

/// Name of the per-user data folder
const DATA_FOLDER: &str = "RetailPOS-PrintHelper";

/// 服务配置 - print helper process settings
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | PORT | 5005 | HTTP 服务端口 |
/// | BIND_ALL | 0 | `1` 监听 0.0.0.0 (默认仅 127.0.0.1) |
/// | PRINT_HELPER_DATA_DIR | $APPDATA/RetailPOS-PrintHelper | 配置、日志、临时文件 |
/// | LOG_LEVEL | info | tracing 过滤器 |
/// | LOG_TO_FILE | 1 | `0` 输出到控制台, 否则写入 logs/ 滚动文件 |
/// | PRINT_VERBOSE | 0 | 打印前记录完整打印机列表 |
/// | PRINT_DELAY_MS | 0 | 提交打印前的延迟 |
/// | CLEANUP_DELAY_MS | 5000 | 临时文件删除延迟 |
/// | USE_RAW_PRINT / USE_SIMPLE_PRINT | 0 | 仅在 /diagnostics 中报告 |
/// | PRINT_BACKEND | auto | auto / shell / native |
/// | SUMATRA_PDF_PATH | SumatraPDF.exe | Windows PDF 打印工具 |
/// | ENUM_TIMEOUT_MS | 10000 | 打印机枚举超时 |
/// | STATUS_TIMEOUT_MS | 3000 | 状态查询超时 |
#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub bind_all: bool,
    /// Holds config.json, print_backend.log, logs/ and tmp/
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_to_file: bool,
    pub verbose: bool,
    pub print_delay_ms: u64,
    pub cleanup_delay_ms: u64,
    pub use_raw: bool,
    pub backend: BackendPreference,
    pub pdf_tool: String,
    pub enum_timeout_ms: u64,
    pub status_timeout_ms: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env_flag_or(key, false)
}

fn env_flag_or(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v.trim() == "1").unwrap_or(default)
}

/// Default data directory: the user's roaming/local app data, else home
fn default_data_dir() -> PathBuf {
    let base = ["APPDATA", "LOCALAPPDATA", "HOME"]
        .iter()
        .find_map(|key| std::env::var_os(key))
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(DATA_FOLDER)
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            http_port: env_parse("PORT", 5005),
            bind_all: env_flag("BIND_ALL"),
            data_dir: std::env::var_os("PRINT_HELPER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_to_file: env_flag_or("LOG_TO_FILE", true),
            verbose: env_flag("PRINT_VERBOSE"),
            print_delay_ms: env_parse("PRINT_DELAY_MS", 0),
            cleanup_delay_ms: env_parse("CLEANUP_DELAY_MS", 5000),
            use_raw: env_flag("USE_SIMPLE_PRINT") || env_flag("USE_RAW_PRINT"),
            backend: std::env::var("PRINT_BACKEND")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            pdf_tool: std::env::var("SUMATRA_PDF_PATH")
                .unwrap_or_else(|_| "SumatraPDF.exe".into()),
            enum_timeout_ms: env_parse("ENUM_TIMEOUT_MS", 10_000),
            status_timeout_ms: env_parse("STATUS_TIMEOUT_MS", 3_000),
        }
    }

    /// 使用指定数据目录 (常用于测试场景)
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_env();
        config.data_dir = data_dir.into();
        config.print_delay_ms = 0;
        config.verbose = false;
        config
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn diagnostic_log_path(&self) -> PathBuf {
        self.data_dir.join("print_backend.log")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Rolling log directory, `None` for console output
    pub fn file_log_dir(&self) -> Option<PathBuf> {
        self.log_to_file.then(|| self.log_dir())
    }

    /// Directory for per-request print artifacts
    pub fn artifact_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    pub fn print_delay(&self) -> Duration {
        Duration::from_millis(self.print_delay_ms)
    }

    pub fn backend_timeouts(&self) -> BackendTimeouts {
        BackendTimeouts {
            enumeration: Duration::from_millis(self.enum_timeout_ms),
            status: Duration::from_millis(self.status_timeout_ms),
            ..BackendTimeouts::default()
        }
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        let ip = if self.bind_all {
            [0, 0, 0, 0]
        } else {
            [127, 0, 0, 1]
        };
        std::net::SocketAddr::from((ip, self.http_port))
    }

    /// Create the data and artifact directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.artifact_dir())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_data_dir() {
        let config = Config::with_data_dir("/tmp/ph");
        assert_eq!(config.config_path(), PathBuf::from("/tmp/ph/config.json"));
        assert_eq!(
            config.diagnostic_log_path(),
            PathBuf::from("/tmp/ph/print_backend.log")
        );
        assert_eq!(config.artifact_dir(), PathBuf::from("/tmp/ph/tmp"));
    }

    #[test]
    fn test_file_logging_is_optional() {
        let mut config = Config::with_data_dir("/tmp/ph");
        config.log_to_file = true;
        assert_eq!(config.file_log_dir(), Some(PathBuf::from("/tmp/ph/logs")));
        config.log_to_file = false;
        assert_eq!(config.file_log_dir(), None);
    }

    #[test]
    fn test_listen_addr_loopback_by_default() {
        let mut config = Config::with_data_dir("/tmp/ph");
        config.bind_all = false;
        config.http_port = 5005;
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:5005");
    }
}
