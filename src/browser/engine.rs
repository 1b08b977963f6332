//! 自动化引擎 - 基础设施层
//!
//! 持有唯一的浏览器会话（Browser + Page），只暴露原语能力。
//! 构造完成后，只有所有者循环可以调用这里的任何方法。
//!
//! ## 职责
//! - 持有唯一的 Browser / Page 资源
//! - 暴露 navigate / find / text / click 等原语
//! - 不认识指令队列，不关心 HTTP
//!
//! 所有 DOM 操作统一通过 `Page::evaluate` 执行 JS 完成，
//! 选择器以 JSON 字面量内插，避免手工转义。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::connection;
use crate::config::Config;
use crate::gateway::command::SelectorKind;

/// 引擎错误
///
/// `Operation` 是指令级失败（本次操作失败，引擎仍可用）；
/// `Fatal` 是引擎级失败（底层会话已不可用，需要重建）。
/// 两者的区分决定了网关是否进入 degraded 状态。
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Operation(String),
    #[error("browser session lost: {0}")]
    Fatal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// 引擎结构化健康状况
///
/// 返回分项而不是布尔值，让调用方能区分
/// "尚未初始化"与"已初始化但失联"。
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineHealth {
    pub has_browser: bool,
    pub has_page: bool,
    pub is_connected: bool,
}

impl EngineHealth {
    /// 结构完整（浏览器与页面均非空）
    pub fn structurally_ready(&self) -> bool {
        self.has_browser && self.has_page
    }
}

/// 单个元素的快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub index: usize,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attribute_value: Option<String>,
}

/// 统一重试策略
///
/// 点击/输入的多套兜底策略和导航重试都由这一个策略对象驱动，
/// 不再散落在各调用点。
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// 第 attempt 次（0 起）失败后的等待时间，线性递增
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff * (attempt as u32 + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// 自动化引擎抽象
///
/// 每个方法都可能阻塞真实的网络/页面操作（数百毫秒到数十秒），
/// 且必须串行执行；串行化由所有者循环保证，实现方不需要加锁。
#[async_trait]
pub trait AutomationEngine: Send {
    async fn navigate(&mut self, url: &str) -> EngineResult<()>;
    async fn find_element(&mut self, selector: &str, by: SelectorKind) -> EngineResult<bool>;
    async fn find_elements(
        &mut self,
        selector: &str,
        by: SelectorKind,
        attribute: Option<&str>,
    ) -> EngineResult<Vec<ElementSnapshot>>;
    async fn get_text(&mut self, selector: &str, by: SelectorKind)
        -> EngineResult<Option<String>>;
    async fn get_element_text(
        &mut self,
        selector: &str,
        by: SelectorKind,
        index: usize,
    ) -> EngineResult<Option<String>>;
    async fn get_attribute(
        &mut self,
        selector: &str,
        by: SelectorKind,
        attribute: &str,
    ) -> EngineResult<Option<String>>;
    async fn page_source(&mut self) -> EngineResult<String>;
    /// 返回 Ok(false) 表示超时内未出现
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        by: SelectorKind,
        timeout: Duration,
    ) -> EngineResult<bool>;
    /// 返回 Ok(false) 表示元素不存在
    async fn click(&mut self, selector: &str, by: SelectorKind) -> EngineResult<bool>;
    /// 返回 Ok(false) 表示元素不存在
    async fn type_text(
        &mut self,
        selector: &str,
        by: SelectorKind,
        text: &str,
    ) -> EngineResult<bool>;
    async fn scroll(&mut self, amount: i64) -> EngineResult<()>;
    /// 结构化健康探测，不得抛错
    async fn probe(&mut self) -> EngineHealth;
    /// 幂等关闭（重复调用返回 Ok）
    async fn close(&mut self) -> EngineResult<()>;
}

/// 引擎工厂
///
/// 监督者通过工厂重建引擎（初次启动与降级恢复共用一条路径）。
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(&self) -> Result<Box<dyn AutomationEngine>>;
}

// ========== Chromium 实现 ==========

/// 基于 chromiumoxide 的自动化引擎
pub struct ChromiumEngine {
    browser: Option<Browser>,
    page: Option<Page>,
    retry: RetryPolicy,
}

impl ChromiumEngine {
    pub fn new(browser: Browser, page: Page, retry: RetryPolicy) -> Self {
        Self {
            browser: Some(browser),
            page: Some(page),
            retry,
        }
    }

    fn page(&self) -> EngineResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| EngineError::Fatal("page is not initialized".to_string()))
    }

    /// 执行 JS 并返回 JSON 结果
    async fn eval(&self, js_code: String) -> EngineResult<JsonValue> {
        let page = self.page()?;
        match page.evaluate(js_code).await {
            Ok(result) => result
                .into_value()
                .map_err(|e| EngineError::Operation(format!("failed to decode script result: {}", e))),
            Err(e) => Err(self.classify(e).await),
        }
    }

    /// 区分指令级与引擎级错误：
    /// 出错后还能列出页面说明会话仍在，按指令级处理。
    async fn classify(&self, err: CdpError) -> EngineError {
        if let Some(browser) = &self.browser {
            if browser.pages().await.is_err() {
                return EngineError::Fatal(err.to_string());
            }
        }
        EngineError::Operation(err.to_string())
    }
}

/// 生成定位单个元素的 JS 表达式
fn locator_js(selector: &str, by: SelectorKind) -> String {
    let sel = js_string(selector);
    match by {
        SelectorKind::Css => format!("document.querySelector({})", sel),
        SelectorKind::Xpath => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            sel
        ),
    }
}

/// 生成定位全部匹配元素的 JS 表达式（返回数组）
fn all_locator_js(selector: &str, by: SelectorKind) -> String {
    let sel = js_string(selector);
    match by {
        SelectorKind::Css => format!("Array.from(document.querySelectorAll({}))", sel),
        SelectorKind::Xpath => format!(
            "(() => {{ const r = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()",
            sel
        ),
    }
}

/// 把 Rust 字符串编码成 JS 字符串字面量
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl AutomationEngine for ChromiumEngine {
    async fn navigate(&mut self, url: &str) -> EngineResult<()> {
        let page = self.page()?;
        let mut last_error = String::new();

        for attempt in 0..self.retry.max_attempts {
            match page.goto(url).await {
                Ok(_) => {
                    // 等待导航完成；个别站点不触发导航事件，失败不致命
                    if let Err(e) = page.wait_for_navigation().await {
                        debug!("等待导航完成时出错: {}", e);
                    }
                    return Ok(());
                }
                Err(e) => match self.classify(e).await {
                    EngineError::Fatal(msg) => return Err(EngineError::Fatal(msg)),
                    EngineError::Operation(msg) => {
                        warn!(
                            "导航失败 (尝试 {}/{}): {}",
                            attempt + 1,
                            self.retry.max_attempts,
                            msg
                        );
                        last_error = msg;
                    }
                },
            }
            if attempt + 1 < self.retry.max_attempts {
                sleep(self.retry.backoff).await;
            }
        }

        Err(EngineError::Operation(format!(
            "failed to navigate to {} after {} attempts: {}",
            url, self.retry.max_attempts, last_error
        )))
    }

    async fn find_element(&mut self, selector: &str, by: SelectorKind) -> EngineResult<bool> {
        let js = format!(
            "(() => {{ const el = {}; return el !== null && el !== undefined; }})()",
            locator_js(selector, by)
        );
        let value = self.eval(js).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn find_elements(
        &mut self,
        selector: &str,
        by: SelectorKind,
        attribute: Option<&str>,
    ) -> EngineResult<Vec<ElementSnapshot>> {
        let extract = match attribute {
            Some(attr) => format!(
                "{{ index: i, text: null, attribute_value: el.getAttribute({}) }}",
                js_string(attr)
            ),
            None => "{ index: i, text: el.innerText ?? el.textContent ?? null, attribute_value: null }"
                .to_string(),
        };
        let js = format!(
            "(() => {{ const els = {}; return els.map((el, i) => ({})); }})()",
            all_locator_js(selector, by),
            extract
        );
        let value = self.eval(js).await?;
        serde_json::from_value(value)
            .map_err(|e| EngineError::Operation(format!("failed to decode element list: {}", e)))
    }

    async fn get_text(
        &mut self,
        selector: &str,
        by: SelectorKind,
    ) -> EngineResult<Option<String>> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return null; return el.innerText ?? el.textContent ?? null; }})()",
            locator_js(selector, by)
        );
        let value = self.eval(js).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn get_element_text(
        &mut self,
        selector: &str,
        by: SelectorKind,
        index: usize,
    ) -> EngineResult<Option<String>> {
        let js = format!(
            "(() => {{ const els = {}; const el = els[{}]; if (!el) return null; return el.innerText ?? el.textContent ?? null; }})()",
            all_locator_js(selector, by),
            index
        );
        let value = self.eval(js).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn get_attribute(
        &mut self,
        selector: &str,
        by: SelectorKind,
        attribute: &str,
    ) -> EngineResult<Option<String>> {
        let js = format!(
            "(() => {{ const el = {}; if (!el) return null; return el.getAttribute({}); }})()",
            locator_js(selector, by),
            js_string(attribute)
        );
        let value = self.eval(js).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn page_source(&mut self) -> EngineResult<String> {
        let value = self
            .eval("document.documentElement.outerHTML".to_string())
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        by: SelectorKind,
        timeout: Duration,
    ) -> EngineResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.find_element(selector, by).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    async fn click(&mut self, selector: &str, by: SelectorKind) -> EngineResult<bool> {
        if !self.find_element(selector, by).await? {
            return Ok(false);
        }

        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts {
            // 兜底策略按次序升级：标准点击 → 合成鼠标事件 → 聚焦后点击
            let click_js = match attempt {
                0 => "el.scrollIntoView({block: 'center'}); el.click();",
                1 => "el.dispatchEvent(new MouseEvent('click', {view: window, bubbles: true, cancelable: true, buttons: 1}));",
                _ => "el.focus(); el.click();",
            };
            let js = format!(
                "(() => {{ const el = {}; if (!el) return false; {} return true; }})()",
                locator_js(selector, by),
                click_js
            );
            match self.eval(js).await {
                Ok(value) if value.as_bool().unwrap_or(false) => return Ok(true),
                Ok(_) => last_error = "element disappeared before click".to_string(),
                Err(EngineError::Fatal(msg)) => return Err(EngineError::Fatal(msg)),
                Err(EngineError::Operation(msg)) => {
                    warn!(
                        "点击失败 (策略 {}/{}): {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        msg
                    );
                    last_error = msg;
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                sleep(self.retry.backoff).await;
            }
        }

        Err(EngineError::Operation(format!(
            "all click strategies failed for selector {}: {}",
            selector, last_error
        )))
    }

    async fn type_text(
        &mut self,
        selector: &str,
        by: SelectorKind,
        text: &str,
    ) -> EngineResult<bool> {
        if !self.find_element(selector, by).await? {
            return Ok(false);
        }

        let value = js_string(text);
        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts {
            // 策略 1：表单控件赋值；策略 2：contenteditable 文本节点
            let type_js = match attempt {
                0 => format!(
                    "el.focus(); el.value = {}; el.dispatchEvent(new Event('input', {{bubbles: true}})); el.dispatchEvent(new Event('change', {{bubbles: true}}));",
                    value
                ),
                _ => format!(
                    "el.focus(); el.textContent = {}; el.dispatchEvent(new Event('input', {{bubbles: true}})); el.dispatchEvent(new Event('change', {{bubbles: true}}));",
                    value
                ),
            };
            let js = format!(
                "(() => {{ const el = {}; if (!el) return false; {} return true; }})()",
                locator_js(selector, by),
                type_js
            );
            match self.eval(js).await {
                Ok(v) if v.as_bool().unwrap_or(false) => return Ok(true),
                Ok(_) => last_error = "element disappeared before typing".to_string(),
                Err(EngineError::Fatal(msg)) => return Err(EngineError::Fatal(msg)),
                Err(EngineError::Operation(msg)) => {
                    warn!(
                        "输入失败 (策略 {}/{}): {}",
                        attempt + 1,
                        self.retry.max_attempts,
                        msg
                    );
                    last_error = msg;
                }
            }
            if attempt + 1 < self.retry.max_attempts {
                sleep(self.retry.backoff).await;
            }
        }

        Err(EngineError::Operation(format!(
            "all typing strategies failed for selector {}: {}",
            selector, last_error
        )))
    }

    async fn scroll(&mut self, amount: i64) -> EngineResult<()> {
        let js = format!("(() => {{ window.scrollBy(0, {}); return true; }})()", amount);
        self.eval(js).await?;
        Ok(())
    }

    async fn probe(&mut self) -> EngineHealth {
        let is_connected = match &self.browser {
            Some(browser) => browser.pages().await.is_ok(),
            None => false,
        };
        EngineHealth {
            has_browser: self.browser.is_some(),
            has_page: self.page.is_some(),
            is_connected,
        }
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器时出错: {}", e);
            }
            let _ = browser.wait().await;
        }
        Ok(())
    }
}

/// Chromium 引擎工厂
pub struct ChromiumFactory {
    debug_port: u16,
    launch_fallback: bool,
    retry: RetryPolicy,
}

impl ChromiumFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            debug_port: config.browser_debug_port,
            launch_fallback: config.launch_fallback,
            retry: RetryPolicy::new(
                config.navigation_attempts,
                Duration::from_secs(1),
            ),
        }
    }
}

#[async_trait]
impl EngineFactory for ChromiumFactory {
    async fn build(&self) -> Result<Box<dyn AutomationEngine>> {
        let (browser, page) =
            connection::connect_to_browser_and_page(self.debug_port, self.launch_fallback).await?;
        Ok(Box::new(ChromiumEngine::new(browser, page, self.retry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        let js = js_string(r#"a[href="x"]"#);
        assert_eq!(js, r#""a[href=\"x\"]""#);
    }

    #[test]
    fn test_locator_js_css() {
        let js = locator_js("h1.title", SelectorKind::Css);
        assert_eq!(js, r#"document.querySelector("h1.title")"#);
    }

    #[test]
    fn test_locator_js_xpath() {
        let js = locator_js("//h1", SelectorKind::Xpath);
        assert!(js.contains("document.evaluate"));
        assert!(js.contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_retry_backoff_escalates() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(6));
    }
}
