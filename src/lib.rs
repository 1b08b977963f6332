//! # Seed Pitcher
//!
//! 一个用于自动化投资人筛选的浏览器序列化网关服务
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 持有稀缺资源（浏览器会话），只暴露原语能力
//! - `gateway/` - 序列化网关：唯一的引擎 owner 循环 + 指令/结果关联
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个档案
//! - `ProfileExtractor` - 档案抽取能力
//! - `investor_scoring` - 纯函数评分能力（关键词 + 综合两种模式）
//! - `LlmService` - LLM 判断能力
//! - `message_drafter` - 触达消息起草能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一位投资人"的完整分析流程
//! - `InvestorFlow` - 流程编排（抽取 → 分析 → 富集 → 评分 → 起草）
//!
//! ### ④ 编排层（API）
//! - `api/` - HTTP 门面，把原语和复合操作暴露成同步端点
//!
//! ## 并发模型
//!
//! 浏览器会话非线程安全：构造之后只有 gateway 的所有者循环可以
//! 触碰它。任意数量的并发 HTTP 处理器通过有界指令队列提交操作，
//! 经 id 关联表取回各自的结果；同一时刻最多一条指令在引擎上执行。

pub mod api;
pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{build_router, AppContext};
pub use browser::{AutomationEngine, ChromiumFactory, EngineFactory, EngineHealth};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use gateway::{CommandAction, CommandResult, EngineState, Gateway, GatewayConfig};
pub use models::{InvestorReport, ProfileSignals, StartupInfo};
pub use workflow::InvestorFlow;
