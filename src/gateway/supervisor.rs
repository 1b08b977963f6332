//! 网关与生命周期监督 - 基础设施层
//!
//! `Gateway` 是序列化网关的对外门面：任意数量的并发请求处理器
//! 通过它向唯一的引擎所有者循环提交指令。它显式持有指令通道、
//! 等待表、状态与 worker 句柄，在进程启动时构造一次并以引用
//! 注入 HTTP 层（不使用模块级全局状态）。
//!
//! ## 职责
//! - 幂等启动所有者循环，并在限定时间内观察就绪标志
//! - 提交指令并在截止时间内等待对应结果
//! - 暴露结构化健康状况
//! - 降级恢复（重建所有者循环）与幂等关闭

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::browser::engine::{EngineFactory, EngineHealth};
use crate::config::Config;
use crate::error::{AppError, AppResult, GatewayError};
use crate::gateway::command::{Command, CommandAction, CommandResult, EngineState};
use crate::gateway::correlation::WaiterTable;
use crate::gateway::owner_loop::{self, OwnerLoopConfig, SharedState};

/// 网关参数
#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
    pub queue_capacity: usize,
    /// 监督者等待就绪标志的上限
    pub startup_timeout: Duration,
    /// 就绪标志的轮询间隔
    pub startup_poll: Duration,
    /// 所有者循环等待下一条指令的上限
    pub idle_poll: Duration,
    pub init_attempts: usize,
    pub init_backoff: Duration,
    /// close 指令的等待截止时间
    pub close_deadline: Duration,
}

impl GatewayConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_capacity: config.command_queue_capacity,
            startup_timeout: Duration::from_secs(config.startup_timeout_secs),
            startup_poll: Duration::from_millis(100),
            idle_poll: Duration::from_secs(1),
            init_attempts: config.engine_init_attempts,
            init_backoff: Duration::from_secs(config.engine_init_backoff_secs),
            close_deadline: Duration::from_secs(config.command_timeout_secs),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 一代 worker：指令发送端 + 这一代的共享状态 + 任务句柄
struct Worker {
    commands: mpsc::Sender<Command>,
    shared: Arc<SharedState>,
    handle: JoinHandle<()>,
}

/// 结构化健康报告
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthReport {
    pub state: EngineState,
    pub running: bool,
    pub detail: EngineHealth,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.state == EngineState::Ready && self.detail.structurally_ready()
    }
}

/// 序列化网关
pub struct Gateway {
    factory: Arc<dyn EngineFactory>,
    config: GatewayConfig,
    waiters: Arc<WaiterTable>,
    worker: tokio::sync::Mutex<Option<Worker>>,
    /// 显式关闭后置位，之后拒绝重建（stopped 是终态）
    closed: AtomicBool,
}

impl Gateway {
    pub fn new(factory: Arc<dyn EngineFactory>, config: GatewayConfig) -> Self {
        Self {
            factory,
            config,
            waiters: Arc::new(WaiterTable::new()),
            worker: tokio::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// 幂等启动：已有存活的所有者循环时直接返回
    ///
    /// 否则清理残留等待者、启动新循环，并在 `startup_timeout` 内
    /// 轮询就绪标志；超时只代表观察失败，循环本身仍在后台运行。
    pub async fn ensure_started(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Gateway(GatewayError::Closed));
        }

        let shared = {
            let mut slot = self.worker.lock().await;

            if let Some(worker) = slot.as_ref() {
                if worker.shared.is_running() && !worker.handle.is_finished() {
                    debug!("所有者循环已在运行");
                    return Ok(());
                }
            }

            // 替换旧 worker：通知其退出，清空残留等待者
            if let Some(old) = slot.take() {
                old.shared.stop();
            }
            let dropped = self.waiters.clear();
            if dropped > 0 {
                warn!("启动前清除了 {} 个残留等待者", dropped);
            }

            let (tx, rx) = mpsc::channel(self.config.queue_capacity);
            let shared = Arc::new(SharedState::new());
            let handle = tokio::spawn(owner_loop::run(
                self.factory.clone(),
                rx,
                self.waiters.clone(),
                shared.clone(),
                OwnerLoopConfig {
                    init_attempts: self.config.init_attempts,
                    init_backoff: self.config.init_backoff,
                    idle_poll: self.config.idle_poll,
                },
            ));
            *slot = Some(Worker {
                commands: tx,
                shared: shared.clone(),
                handle,
            });
            shared
        };

        // 轮询就绪标志（只观察，不干预）
        let deadline = Instant::now() + self.config.startup_timeout;
        loop {
            match shared.state() {
                EngineState::Ready => {
                    info!("✅ 网关就绪");
                    return Ok(());
                }
                EngineState::Stopped => break,
                _ if !shared.is_running() => break,
                _ => {}
            }
            if Instant::now() >= deadline {
                warn!("⏱️ 等待引擎就绪超时");
                break;
            }
            sleep(self.config.startup_poll).await;
        }

        Err(AppError::Gateway(GatewayError::StartupFailed {
            attempts: self.config.init_attempts,
        }))
    }

    /// 提交一条指令并等待它的结果
    ///
    /// 调用方（而不是引擎）在这里阻塞。超过截止时间按失败处理；
    /// 指令可能仍会执行，迟到的结果会被等待表静默丢弃。
    pub async fn submit(
        &self,
        action: CommandAction,
        deadline: Duration,
    ) -> AppResult<CommandResult> {
        let sender = {
            let slot = self.worker.lock().await;
            match slot.as_ref() {
                Some(worker) if worker.shared.is_running() => worker.commands.clone(),
                _ => return Err(AppError::Gateway(GatewayError::NotRunning)),
            }
        };

        let command = Command::new(action);
        let id = command.id.clone();
        let name = command.action.name();

        // 先登记等待者再入队，确保结果不会在注册之前到达
        let receiver = self.waiters.register(&id);

        // 有界等待入队：队列满时不无限阻塞
        match timeout(deadline, sender.send(command)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                self.waiters.forget(&id);
                return Err(AppError::Gateway(GatewayError::NotRunning));
            }
            Err(_) => {
                self.waiters.forget(&id);
                return Err(AppError::gateway_timeout(id, name));
            }
        }

        match timeout(deadline, receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => {
                self.waiters.forget(&id);
                Err(AppError::Gateway(GatewayError::ChannelClosed))
            }
            Err(_) => {
                self.waiters.forget(&id);
                debug!("放弃等待指令 {} ({})", id, name);
                Err(AppError::gateway_timeout(id, name))
            }
        }
    }

    /// 当前引擎状态
    pub async fn state(&self) -> EngineState {
        let slot = self.worker.lock().await;
        match slot.as_ref() {
            Some(worker) => worker.shared.state(),
            None if self.closed.load(Ordering::SeqCst) => EngineState::Stopped,
            None => EngineState::Uninitialized,
        }
    }

    /// 结构化健康状况
    pub async fn health(&self) -> HealthReport {
        let slot = self.worker.lock().await;
        match slot.as_ref() {
            Some(worker) => HealthReport {
                state: worker.shared.state(),
                running: worker.shared.is_running(),
                detail: worker.shared.health(),
            },
            None => HealthReport {
                state: if self.closed.load(Ordering::SeqCst) {
                    EngineState::Stopped
                } else {
                    EngineState::Uninitialized
                },
                running: false,
                detail: EngineHealth::default(),
            },
        }
    }

    /// 降级恢复：让当前循环退出（退出路径会关闭引擎），随后重建
    ///
    /// 由判定引擎降级的端点就地调用，每个请求最多一次。
    pub async fn restart(&self) -> AppResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::Gateway(GatewayError::Closed));
        }
        warn!("♻️ 正在重建自动化引擎...");
        {
            let mut slot = self.worker.lock().await;
            if let Some(old) = slot.take() {
                old.shared.stop();
            }
        }
        self.waiters.clear();
        self.ensure_started().await
    }

    /// 幂等关闭
    ///
    /// close 指令经由正常通道提交，保证收尾动作在所有者循环内执行；
    /// 关闭后网关进入终态，不再接受重建。
    pub async fn close(&self) -> AppResult<CommandResult> {
        let already_closed = self.closed.swap(true, Ordering::SeqCst);

        let worker = {
            let mut slot = self.worker.lock().await;
            slot.take()
        };

        let Some(worker) = worker else {
            debug!("网关已关闭 (重复关闭: {})", already_closed);
            return Ok(CommandResult::ok(
                "close",
                json!({ "message": "browser already closed" }),
            ));
        };

        if !worker.shared.is_running() {
            return Ok(CommandResult::ok(
                "close",
                json!({ "message": "browser already closed" }),
            ));
        }

        info!("📪 正在关闭浏览器网关...");
        let command = Command::new(CommandAction::Close);
        let id = command.id.clone();
        let receiver = self.waiters.register(&id);

        let result = match worker.commands.send(command).await {
            Ok(()) => match timeout(self.config.close_deadline, receiver).await {
                Ok(Ok(result)) => result,
                _ => {
                    // 循环没有按时应答，强制清除 running 标志
                    self.waiters.forget(&id);
                    worker.shared.stop();
                    CommandResult::ok(id, json!({ "message": "close signal sent" }))
                }
            },
            Err(_) => {
                self.waiters.forget(&id);
                worker.shared.stop();
                CommandResult::ok(id, json!({ "message": "browser already closed" }))
            }
        };

        // 等待循环收尾（有界；超时则放手让它后台结束）
        if timeout(Duration::from_secs(5), worker.handle).await.is_err() {
            warn!("等待所有者循环退出超时");
        }

        info!("✅ 浏览器网关已关闭");
        Ok(result)
    }
}
