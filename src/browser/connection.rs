use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// 连接到浏览器并获取页面
///
/// 优先通过调试端口附加到已运行的浏览器实例；
/// 附加失败且允许回退时，启动一个新的无头实例。
pub async fn connect_to_browser_and_page(
    port: u16,
    launch_fallback: bool,
) -> Result<(Browser, Page)> {
    match connect_existing(port).await {
        Ok(pair) => Ok(pair),
        Err(e) if launch_fallback => {
            warn!("无法附加到现有浏览器: {}，尝试启动新实例...", e);
            launch_headless().await
        }
        Err(e) => Err(e),
    }
}

/// 附加到已运行的浏览器实例
async fn connect_existing(port: u16) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        debug!("连接浏览器失败: {}", e);
        e
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    // 复用第一个已有页面，没有则创建空白页面
    if let Some(page) = pages.into_iter().next() {
        info!("✓ 已附加到现有页面");
        return Ok((browser, page));
    }

    debug!("没有可复用的页面，创建空白页面");
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建空白页面失败: {}", e);
        e
    })?;

    Ok((browser, page))
}

/// 启动无头浏览器实例
async fn launch_headless() -> Result<(Browser, Page)> {
    info!("🚀 启动无头浏览器...");

    let config = BrowserConfig::builder()
        .new_headless_mode()
        .args(vec![
            "--disable-gpu",             // 无头模式下禁用 GPU
            "--no-sandbox",              // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage",   // 防止共享内存不足
            "--window-size=1920,1080",   // 较大的窗口，避免响应式布局隐藏元素
            "--remote-debugging-port=0", // 让浏览器自动选择端口
        ])
        .build()
        .map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            anyhow::anyhow!("配置无头浏览器失败: {}", e)
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        anyhow::anyhow!("启动无头浏览器失败: {}", e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        anyhow::anyhow!("创建页面失败: {}", e)
    })?;

    info!("✅ 无头浏览器已就绪");

    Ok((browser, page))
}
