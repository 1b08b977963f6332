use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use seed_pitcher::api;
use seed_pitcher::browser::ChromiumFactory;
use seed_pitcher::config::Config;
use seed_pitcher::gateway::{Gateway, GatewayConfig};
use seed_pitcher::models::startup::{load_startup_info, StartupInfo};
use seed_pitcher::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    logging::init_log_file(&config.output_log_file)?;
    logging::log_startup(&config);

    // 构造网关（进程内唯一实例，注入 HTTP 层）
    let factory = Arc::new(ChromiumFactory::new(&config));
    let gateway = Arc::new(Gateway::new(factory, GatewayConfig::from_config(&config)));

    // 启动引擎；失败不阻止 HTTP 服务启动，/health 会如实报告不健康
    if let Err(e) = gateway.ensure_started().await {
        warn!("⚠️ 引擎启动失败，服务仍将启动: {}", e);
    }

    // 创业公司信息（用于消息起草与领域匹配，缺失时用空信息）
    let startup = match load_startup_info(&config.startup_file).await {
        Ok(startup) => startup,
        Err(e) => {
            warn!("未能加载创业公司信息 ({}): {}", config.startup_file, e);
            StartupInfo::default()
        }
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let ctx = Arc::new(api::AppContext::new(gateway, config, startup));
    let app = api::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 浏览器网关服务监听于 {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
