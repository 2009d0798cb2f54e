use print_server::{ServerState, print_banner, setup_environment};
use std::time::Duration;

/// 后台任务健康检查间隔
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 工作目录, 日志)
    let config = setup_environment()?;

    print_banner();
    tracing::info!(environment = %config.environment, "Print kiosk server starting...");

    // 2. 初始化状态 (存储、价格表、订单管理器)
    let state = ServerState::initialize(&config)?;

    // 3. 启动后台任务 (过期扫描、打印投递)
    let tasks = state.start_background_tasks();

    let mut health = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = health.tick() => {
                tasks.check_health();
            }
        }
    }

    tasks.shutdown(config.shutdown_timeout()).await;
    Ok(())
}
