//! 档案抽取 - 业务能力层
//!
//! 复合操作：导航（带重试与递增的加载等待）之后，按选择器表的
//! 优先级逐字段探测，取第一个非空结果。所有页面访问都经由网关
//! 指令完成，本模块不直接触碰引擎。

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::engine::RetryPolicy;
use crate::config::Config;
use crate::error::{AppError, AppResult, BrowserError};
use crate::gateway::command::{CommandAction, EngineState};
use crate::gateway::supervisor::Gateway;
use crate::models::profile::ProfileSignals;
use crate::services::selectors;

/// 经历条目最多保留几条
const MAX_EXPERIENCE_ENTRIES: usize = 5;
/// 短于该长度的经历文本视为噪声
const MIN_EXPERIENCE_CHARS: usize = 10;

/// 档案抽取器
#[derive(Clone)]
pub struct ProfileExtractor {
    gateway: Arc<Gateway>,
    navigation: RetryPolicy,
    /// 导航成功后的基础加载等待，按尝试次数递增
    settle_base: Duration,
    settle_step: Duration,
    navigate_deadline: Duration,
    element_deadline: Duration,
}

impl ProfileExtractor {
    pub fn new(gateway: Arc<Gateway>, config: &Config) -> Self {
        Self {
            gateway,
            navigation: RetryPolicy::new(config.navigation_attempts, Duration::from_secs(2)),
            settle_base: Duration::from_secs(config.navigation_settle_secs),
            settle_step: Duration::from_secs(2),
            navigate_deadline: Duration::from_secs(config.command_timeout_secs),
            element_deadline: Duration::from_secs(config.element_timeout_secs),
        }
    }

    /// 归一化档案 URL：截取到 /in/{user}，去掉查询参数等尾巴
    ///
    /// 非档案链接原样返回，由调用方自行承担导航结果。
    pub fn normalize_profile_url(url: &str) -> String {
        // 正则固定且经测试覆盖，构造失败不可达
        match Regex::new(r"^(https?://(?:www\.)?linkedin\.com/in/[^/?#]+)") {
            Ok(pattern) => match pattern.captures(url) {
                Some(captures) => captures[1].to_string(),
                None => url.to_string(),
            },
            Err(_) => url.to_string(),
        }
    }

    /// 抽取一份完整的档案信号
    pub async fn extract(&self, url: &str) -> AppResult<ProfileSignals> {
        let url = Self::normalize_profile_url(url);
        info!("📄 开始抽取档案: {}", url);

        self.navigate_with_settle(&url).await?;

        let mut signals = ProfileSignals {
            url: url.clone(),
            extraction_complete: true,
            ..Default::default()
        };

        signals.name = self.first_text("name").await;
        signals.headline = self.first_text("headline").await;
        signals.about = self.first_text("about").await;
        signals.experience = self.experience_entries().await;

        // 抽取途中引擎降级会让后续字段全部落空；做个标记，
        // 让上层决定是否应用保底策略
        if self.gateway.state().await != EngineState::Ready {
            warn!("⚠️ 抽取过程中引擎已不再就绪，档案可能不完整");
            signals.extraction_complete = false;
        }

        info!(
            "✓ 档案抽取完成: name={} headline={} about={} 经历 {} 条",
            signals.name.is_some(),
            signals.headline.is_some(),
            signals.about.is_some(),
            signals.experience.len()
        );

        Ok(signals)
    }

    /// 导航并等待页面加载，重试时等待时间递增
    async fn navigate_with_settle(&self, url: &str) -> AppResult<()> {
        for attempt in 0..self.navigation.max_attempts {
            let result = self
                .gateway
                .submit(
                    CommandAction::Navigate {
                        url: url.to_string(),
                    },
                    self.navigate_deadline,
                )
                .await;

            match result {
                Ok(r) if r.success => {
                    // 等待动态内容渲染；重试越多等待越久
                    let settle = self.settle_base + self.settle_step * attempt as u32;
                    debug!("导航成功，等待 {:?} 加载 (尝试 {})", settle, attempt + 1);
                    if !settle.is_zero() {
                        sleep(settle).await;
                    }
                    return Ok(());
                }
                Ok(r) => {
                    warn!(
                        "导航失败 (尝试 {}/{}): {}",
                        attempt + 1,
                        self.navigation.max_attempts,
                        r.error.unwrap_or_default()
                    );
                }
                Err(e) => {
                    warn!(
                        "导航指令未完成 (尝试 {}/{}): {}",
                        attempt + 1,
                        self.navigation.max_attempts,
                        e
                    );
                }
            }

            if attempt + 1 < self.navigation.max_attempts {
                sleep(self.navigation.backoff).await;
            }
        }

        Err(AppError::Browser(BrowserError::NavigationExhausted {
            url: url.to_string(),
            attempts: self.navigation.max_attempts,
        }))
    }

    /// 按选择器表顺序探测，返回第一个非空文本
    async fn first_text(&self, field: &str) -> Option<String> {
        for selector in selectors::field_selectors(field) {
            // 先探测存在，再取文本（与页面抓取端的探测顺序一致）
            let found = self
                .gateway
                .submit(
                    CommandAction::FindElement {
                        selector: selector.to_string(),
                        by: Default::default(),
                    },
                    self.element_deadline,
                )
                .await;

            match found {
                Ok(r) if r.success && r.found() => {}
                _ => continue,
            }

            let text = self
                .gateway
                .submit(
                    CommandAction::GetText {
                        selector: selector.to_string(),
                        by: Default::default(),
                    },
                    self.element_deadline,
                )
                .await;

            if let Ok(r) = text {
                if let Some(value) = r
                    .data
                    .as_ref()
                    .and_then(|d| d.get("text"))
                    .and_then(|t| t.as_str())
                {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        debug!("字段 {} 命中选择器 {}", field, selector);
                        return Some(trimmed.to_string());
                    }
                }
            }
        }
        debug!("字段 {} 的所有选择器均未命中", field);
        None
    }

    /// 抽取经历条目：找到第一张命中的选择器表后逐条取文本
    async fn experience_entries(&self) -> Vec<String> {
        for selector in selectors::field_selectors("experience") {
            let found = self
                .gateway
                .submit(
                    CommandAction::FindElements {
                        selector: selector.to_string(),
                        by: Default::default(),
                        attribute: None,
                    },
                    self.element_deadline,
                )
                .await;

            let count = match found {
                Ok(r) if r.success => r
                    .data
                    .as_ref()
                    .and_then(|d| d.get("count"))
                    .and_then(|c| c.as_u64())
                    .unwrap_or(0) as usize,
                _ => continue,
            };
            if count == 0 {
                continue;
            }

            let mut entries = Vec::new();
            for index in 0..count.min(MAX_EXPERIENCE_ENTRIES) {
                let text = self
                    .gateway
                    .submit(
                        CommandAction::GetElementText {
                            selector: selector.to_string(),
                            by: Default::default(),
                            index,
                        },
                        self.element_deadline,
                    )
                    .await;

                if let Ok(r) = text {
                    if let Some(value) = r
                        .data
                        .as_ref()
                        .and_then(|d| d.get("text"))
                        .and_then(|t| t.as_str())
                    {
                        let trimmed = value.trim();
                        // 过滤掉太短的噪声条目
                        if trimmed.chars().count() > MIN_EXPERIENCE_CHARS {
                            entries.push(trimmed.to_string());
                        }
                    }
                }
            }

            if !entries.is_empty() {
                return entries;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_tail() {
        assert_eq!(
            ProfileExtractor::normalize_profile_url(
                "https://www.linkedin.com/in/jane-doe/details/experience/?src=feed"
            ),
            "https://www.linkedin.com/in/jane-doe"
        );
    }

    #[test]
    fn test_normalize_keeps_clean_url() {
        assert_eq!(
            ProfileExtractor::normalize_profile_url("https://www.linkedin.com/in/jane-doe"),
            "https://www.linkedin.com/in/jane-doe"
        );
    }

    #[test]
    fn test_normalize_passes_through_other_urls() {
        assert_eq!(
            ProfileExtractor::normalize_profile_url("https://example.com/profile"),
            "https://example.com/profile"
        );
    }
}
