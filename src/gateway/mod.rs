//! 序列化网关 - 基础设施层
//!
//! 让任意数量的并发调用者安全地驱动一个非线程安全的浏览器会话：
//! 指令经有界队列进入唯一的所有者循环，结果经 id 关联表回到
//! 各自的等待者。互斥由"只有所有者循环触碰引擎"这一结构保证，
//! 而不是对引擎加锁。

pub mod command;
pub mod correlation;
pub(crate) mod owner_loop;
pub mod supervisor;

pub use command::{Command, CommandAction, CommandResult, EngineState, SelectorKind};
pub use correlation::WaiterTable;
pub use supervisor::{Gateway, GatewayConfig, HealthReport};
