//! 测试公共设施：脚本化桩引擎 + 工厂
//!
//! 桩引擎按选择器返回预设文本，同时用计数器校验互斥不变量
//! （任何时刻最多一条指令在引擎上执行）。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use seed_pitcher::browser::engine::{
    AutomationEngine, ElementSnapshot, EngineError, EngineFactory, EngineHealth, EngineResult,
};
use seed_pitcher::config::Config;
use seed_pitcher::gateway::{Gateway, GatewayConfig, SelectorKind};

/// 桩引擎的行为脚本
#[derive(Clone, Default)]
pub struct StubScript {
    /// 选择器 → 单元素文本
    pub texts: HashMap<String, String>,
    /// 选择器 → 多元素文本列表
    pub lists: HashMap<String, Vec<String>>,
    /// 导航始终失败（模拟不可达主机）
    pub fail_navigate: bool,
    /// 每个操作的人为耗时
    pub op_delay: Duration,
}

impl StubScript {
    /// 一份典型的投资人档案页面
    pub fn investor_profile() -> Self {
        let mut texts = HashMap::new();
        texts.insert(
            "h1.text-heading-xlarge".to_string(),
            "Jane Doe".to_string(),
        );
        texts.insert(
            "div.text-body-medium".to_string(),
            "Partner at Early Stage Ventures".to_string(),
        );
        texts.insert(
            "div.display-flex.ph5.pv3 > div.inline-show-more-text".to_string(),
            "Angel investor focused on seed rounds.".to_string(),
        );
        Self {
            texts,
            ..Default::default()
        }
    }
}

/// 测试探针：跨引擎实例共享的计数器
#[derive(Default)]
pub struct StubProbes {
    /// 已执行的操作总数
    pub operations: AtomicUsize,
    /// 当前正在执行的操作数
    pub in_flight: AtomicUsize,
    /// 并发峰值（互斥不变量要求恒 ≤ 1）
    pub max_in_flight: AtomicUsize,
    /// close 调用次数
    pub closes: AtomicUsize,
    /// 工厂构造次数
    pub builds: AtomicUsize,
}

pub struct StubEngine {
    script: StubScript,
    probes: Arc<StubProbes>,
}

impl StubEngine {
    /// 记录一次操作并模拟耗时
    async fn tick(&self) {
        let current = self.probes.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probes.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.probes.operations.fetch_add(1, Ordering::SeqCst);
        if !self.script.op_delay.is_zero() {
            tokio::time::sleep(self.script.op_delay).await;
        }
        self.probes.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutomationEngine for StubEngine {
    async fn navigate(&mut self, url: &str) -> EngineResult<()> {
        self.tick().await;
        if self.script.fail_navigate {
            Err(EngineError::Operation(format!(
                "net::ERR_NAME_NOT_RESOLVED for {}",
                url
            )))
        } else {
            Ok(())
        }
    }

    async fn find_element(&mut self, selector: &str, _by: SelectorKind) -> EngineResult<bool> {
        self.tick().await;
        Ok(self.script.texts.contains_key(selector))
    }

    async fn find_elements(
        &mut self,
        selector: &str,
        _by: SelectorKind,
        attribute: Option<&str>,
    ) -> EngineResult<Vec<ElementSnapshot>> {
        self.tick().await;
        let entries = self.script.lists.get(selector).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, text)| ElementSnapshot {
                index,
                text: if attribute.is_none() { Some(text) } else { None },
                attribute_value: None,
            })
            .collect())
    }

    async fn get_text(
        &mut self,
        selector: &str,
        _by: SelectorKind,
    ) -> EngineResult<Option<String>> {
        self.tick().await;
        Ok(self.script.texts.get(selector).cloned())
    }

    async fn get_element_text(
        &mut self,
        selector: &str,
        _by: SelectorKind,
        index: usize,
    ) -> EngineResult<Option<String>> {
        self.tick().await;
        Ok(self
            .script
            .lists
            .get(selector)
            .and_then(|entries| entries.get(index))
            .cloned())
    }

    async fn get_attribute(
        &mut self,
        selector: &str,
        _by: SelectorKind,
        _attribute: &str,
    ) -> EngineResult<Option<String>> {
        self.tick().await;
        Ok(self
            .script
            .texts
            .get(selector)
            .map(|_| "stub-attribute".to_string()))
    }

    async fn page_source(&mut self) -> EngineResult<String> {
        self.tick().await;
        Ok("<html><body>stub</body></html>".to_string())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _by: SelectorKind,
        _timeout: Duration,
    ) -> EngineResult<bool> {
        self.tick().await;
        Ok(self.script.texts.contains_key(selector))
    }

    async fn click(&mut self, selector: &str, _by: SelectorKind) -> EngineResult<bool> {
        self.tick().await;
        Ok(self.script.texts.contains_key(selector))
    }

    async fn type_text(
        &mut self,
        selector: &str,
        _by: SelectorKind,
        _text: &str,
    ) -> EngineResult<bool> {
        self.tick().await;
        Ok(self.script.texts.contains_key(selector))
    }

    async fn scroll(&mut self, _amount: i64) -> EngineResult<()> {
        self.tick().await;
        Ok(())
    }

    async fn probe(&mut self) -> EngineHealth {
        EngineHealth {
            has_browser: true,
            has_page: true,
            is_connected: true,
        }
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.probes.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 桩引擎工厂
pub struct StubFactory {
    script: StubScript,
    pub probes: Arc<StubProbes>,
    /// 前 n 次构造直接失败（模拟引擎起不来）
    fail_first_builds: usize,
}

impl StubFactory {
    pub fn new(script: StubScript) -> Self {
        Self {
            script,
            probes: Arc::new(StubProbes::default()),
            fail_first_builds: 0,
        }
    }

    pub fn failing(script: StubScript, fail_first_builds: usize) -> Self {
        Self {
            script,
            probes: Arc::new(StubProbes::default()),
            fail_first_builds,
        }
    }
}

#[async_trait]
impl EngineFactory for StubFactory {
    async fn build(&self) -> Result<Box<dyn AutomationEngine>> {
        let n = self.probes.builds.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first_builds {
            anyhow::bail!("stub engine refused to start");
        }
        Ok(Box::new(StubEngine {
            script: self.script.clone(),
            probes: self.probes.clone(),
        }))
    }
}

/// 测试用的网关参数（把各种等待压到最短）
pub fn test_gateway_config() -> GatewayConfig {
    GatewayConfig {
        queue_capacity: 16,
        startup_timeout: Duration::from_secs(3),
        startup_poll: Duration::from_millis(10),
        idle_poll: Duration::from_millis(50),
        init_attempts: 2,
        init_backoff: Duration::from_millis(10),
        close_deadline: Duration::from_secs(2),
    }
}

/// 测试用的应用配置（去掉人为等待）
pub fn test_config() -> Config {
    Config {
        navigation_settle_secs: 0,
        navigation_attempts: 2,
        command_timeout_secs: 2,
        element_timeout_secs: 2,
        startup_timeout_secs: 3,
        engine_init_attempts: 2,
        engine_init_backoff_secs: 0,
        ..Config::default()
    }
}

/// 构造一个已就绪的网关
pub async fn spawn_gateway(script: StubScript) -> (Arc<Gateway>, Arc<StubProbes>) {
    let factory = StubFactory::new(script);
    let probes = factory.probes.clone();
    let gateway = Arc::new(Gateway::new(Arc::new(factory), test_gateway_config()));
    gateway
        .ensure_started()
        .await
        .expect("桩引擎网关应该能启动");
    (gateway, probes)
}
