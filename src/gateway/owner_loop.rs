//! 引擎所有者循环
//!
//! 这是构造完成后唯一允许触碰自动化引擎的执行上下文。
//! 算法：running 标志存续期间循环 → 限时等待下一条指令（短间隔轮询，
//! 以便观察标志被外部清除）→ 按动作分派给引擎 → 任何错误都转成失败
//! 结果而不是向外传播 → 每条指令恰好发布一条结果 → 收到 close 时执行
//! 关闭并清除 running 标志。循环退出后无条件再关一次引擎（close 可重入），
//! 避免资源泄漏。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::browser::engine::{AutomationEngine, EngineError, EngineFactory, EngineHealth};
use crate::gateway::command::{Command, CommandAction, CommandResult, EngineState};
use crate::gateway::correlation::WaiterTable;

/// 所有者循环与监督者共享的状态
///
/// 每一代 worker 拥有独立的一份，避免重启后新旧循环互相干扰。
pub(crate) struct SharedState {
    state: Mutex<EngineState>,
    health: Mutex<EngineHealth>,
    running: AtomicBool,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Uninitialized),
            health: Mutex::new(EngineHealth::default()),
            running: AtomicBool::new(true),
        }
    }

    pub(crate) fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            debug!("引擎状态: {:?} → {:?}", *state, next);
            *state = next;
        }
    }

    pub(crate) fn health(&self) -> EngineHealth {
        *self.health.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_health(&self, health: EngineHealth) {
        *self.health.lock().unwrap_or_else(|e| e.into_inner()) = health;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 清除 running 标志（强制停机路径；循环会在一个轮询间隔内观察到）
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// 所有者循环参数
pub(crate) struct OwnerLoopConfig {
    pub init_attempts: usize,
    pub init_backoff: Duration,
    /// 等待下一条指令的上限，决定对停机标志的响应速度
    pub idle_poll: Duration,
}

/// 运行所有者循环直到停机
///
/// 引擎在循环内部构造（带有界重试），因此降级恢复与初次启动
/// 走同一条路径。
pub(crate) async fn run(
    factory: Arc<dyn EngineFactory>,
    mut commands: mpsc::Receiver<Command>,
    waiters: Arc<WaiterTable>,
    shared: Arc<SharedState>,
    config: OwnerLoopConfig,
) {
    info!("🧵 引擎所有者循环启动");
    shared.set_state(EngineState::Starting);

    // ========== 引擎初始化（有界重试） ==========
    let mut engine: Option<Box<dyn AutomationEngine>> = None;
    for attempt in 1..=config.init_attempts {
        info!("正在初始化自动化引擎 (尝试 {}/{})", attempt, config.init_attempts);
        match factory.build().await {
            Ok(built) => {
                engine = Some(built);
                break;
            }
            Err(e) => {
                warn!(
                    "引擎初始化失败 (尝试 {}/{}): {}",
                    attempt, config.init_attempts, e
                );
                shared.set_state(EngineState::Uninitialized);
                if attempt < config.init_attempts {
                    sleep(config.init_backoff).await;
                    shared.set_state(EngineState::Starting);
                }
            }
        }
    }

    let Some(mut engine) = engine else {
        error!("❌ 引擎初始化彻底失败，所有者循环退出");
        shared.stop();
        return;
    };

    let health = engine.probe().await;
    shared.set_health(health);
    if !health.structurally_ready() {
        warn!("⚠️ 引擎结构不完整: {:?}，所有者循环退出", health);
        shared.set_state(EngineState::Uninitialized);
        let _ = engine.close().await;
        shared.stop();
        return;
    }

    shared.set_state(EngineState::Ready);
    info!("✅ 自动化引擎就绪，开始处理指令");

    // ========== 指令处理主循环 ==========
    while shared.is_running() {
        let command = match timeout(config.idle_poll, commands.recv()).await {
            Err(_) => continue, // 空转一轮，重新检查 running 标志
            Ok(None) => {
                debug!("指令通道已关闭，循环退出");
                break;
            }
            Ok(Some(command)) => command,
        };

        let closing = matches!(command.action, CommandAction::Close);
        let id = command.id.clone();
        let name = command.action.name();
        debug!("执行指令 {} ({})", id, name);

        // 任何引擎错误都就地转成失败结果，绝不从这里漏出去——
        // 漏出去意味着所有后续指令再也没人处理
        let result = dispatch(engine.as_mut(), &shared, command).await;
        if let Some(err) = &result.error {
            warn!("指令 {} ({}) 失败: {}", id, name, err);
        }
        waiters.complete(result);

        if closing {
            shared.stop();
        }
    }

    // 循环退出后无条件关闭引擎（close 可重入）
    if let Err(e) = engine.close().await {
        warn!("循环退出时关闭引擎出错: {}", e);
    }
    shared.set_state(EngineState::Stopped);
    info!("🧵 引擎所有者循环结束");
}

/// 按动作分派到引擎原语，并把结果整形成线上格式
///
/// 引擎级（Fatal）错误会把状态打成 degraded，等待端点触发恢复。
async fn dispatch(
    engine: &mut dyn AutomationEngine,
    shared: &SharedState,
    command: Command,
) -> CommandResult {
    let id = command.id;
    match command.action {
        CommandAction::Navigate { url } => {
            match engine.navigate(&url).await {
                Ok(()) => CommandResult::ok(id, json!({ "url": url })),
                Err(e) => fail(id, e, shared),
            }
        }
        CommandAction::FindElement { selector, by } => {
            match engine.find_element(&selector, by).await {
                Ok(true) => CommandResult::ok(id, json!({ "found": true })),
                Ok(false) => CommandResult::fail_with(
                    id,
                    format!("element not found: {}", selector),
                    json!({ "found": false }),
                ),
                Err(e) => fail(id, e, shared),
            }
        }
        CommandAction::FindElements {
            selector,
            by,
            attribute,
        } => match engine.find_elements(&selector, by, attribute.as_deref()).await {
            Ok(elements) => {
                let count = elements.len();
                CommandResult::ok(
                    id,
                    json!({ "found": count > 0, "count": count, "elements": elements }),
                )
            }
            Err(e) => fail(id, e, shared),
        },
        CommandAction::GetText { selector, by } => match engine.get_text(&selector, by).await {
            Ok(Some(text)) => CommandResult::ok(id, json!({ "text": text })),
            Ok(None) => CommandResult::fail(
                id,
                format!("element not found for text extraction: {}", selector),
            ),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::GetElementText {
            selector,
            by,
            index,
        } => match engine.get_element_text(&selector, by, index).await {
            Ok(Some(text)) => CommandResult::ok(id, json!({ "text": text })),
            Ok(None) => CommandResult::fail(
                id,
                format!("element at index {} not found for selector {}", index, selector),
            ),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::GetAttribute {
            selector,
            by,
            attribute,
        } => match engine.get_attribute(&selector, by, &attribute).await {
            Ok(Some(value)) => CommandResult::ok(id, json!({ "attribute_value": value })),
            Ok(None) => CommandResult::fail(
                id,
                format!("element not found for attribute extraction: {}", selector),
            ),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::GetPageSource => match engine.page_source().await {
            Ok(content) => CommandResult::ok(id, json!({ "content": content })),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::WaitForSelector {
            selector,
            by,
            timeout: timeout_ms,
        } => {
            match engine
                .wait_for_selector(&selector, by, Duration::from_millis(timeout_ms))
                .await
            {
                Ok(appeared) => CommandResult::ok(id, json!({ "found": appeared })),
                Err(e) => fail(id, e, shared),
            }
        }
        CommandAction::Click { selector, by } => match engine.click(&selector, by).await {
            Ok(true) => CommandResult::ok(id, json!({ "found": true })),
            Ok(false) => CommandResult::fail_with(
                id,
                format!("element not found: {}", selector),
                json!({ "found": false }),
            ),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::TypeText { selector, by, text } => {
            match engine.type_text(&selector, by, &text).await {
                Ok(true) => CommandResult::ok(id, json!({ "found": true })),
                Ok(false) => CommandResult::fail_with(
                    id,
                    format!("element not found: {}", selector),
                    json!({ "found": false }),
                ),
                Err(e) => fail(id, e, shared),
            }
        }
        CommandAction::Scroll { amount } => match engine.scroll(amount).await {
            Ok(()) => CommandResult::ok(id, json!({ "amount": amount })),
            Err(e) => fail(id, e, shared),
        },
        CommandAction::Close => match engine.close().await {
            Ok(()) => CommandResult::ok(id, json!({ "message": "browser closed" })),
            Err(e) => fail(id, e, shared),
        },
    }
}

fn fail(id: String, err: EngineError, shared: &SharedState) -> CommandResult {
    if matches!(err, EngineError::Fatal(_)) && shared.state() == EngineState::Ready {
        warn!("⚠️ 引擎级错误，状态进入 degraded: {}", err);
        shared.set_state(EngineState::Degraded);
    }
    CommandResult::fail(id, err.to_string())
}
