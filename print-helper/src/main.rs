use anyhow::Context;
use print_helper::{Config, Server, ServerState, init_logger_with_file, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenv::dotenv().ok();

    // 2. 加载配置并准备数据目录
    let config = Config::from_env();
    config
        .ensure_dirs()
        .with_context(|| format!("creating data dir {}", config.data_dir().display()))?;

    // 3. 日志 (控制台或 logs/ 滚动文件)
    let log_dir = config.file_log_dir();
    init_logger_with_file(Some(config.log_level.as_str()), log_dir.as_deref());

    print_banner();
    tracing::info!(
        data_dir = %config.data_dir().display(),
        port = config.http_port,
        "🖨️  Print helper starting..."
    );

    // 4. 探测打印后端并初始化状态
    let state = ServerState::initialize(&config).await;

    // 5. 启动 HTTP 服务器
    let server = Server::new(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e).context("HTTP server failed");
    }

    Ok(())
}
