//! HTTP 门面 - 编排层
//!
//! 把每个自动化原语和复合操作暴露成同步网络端点。
//! 每次调用让调用方（而不是引擎）阻塞等待结果。

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::supervisor::Gateway;
use crate::models::startup::StartupInfo;
use crate::services::profile_extractor::ProfileExtractor;
use crate::workflow::investor_flow::InvestorFlow;

pub use routes::build_router;

/// HTTP 层的共享上下文
///
/// 进程启动时构造一次，以 `Arc` 注入所有处理器（依赖注入，
/// 不使用模块级全局状态）。
pub struct AppContext {
    pub gateway: Arc<Gateway>,
    pub config: Config,
    pub extractor: ProfileExtractor,
    pub flow: InvestorFlow,
}

impl AppContext {
    pub fn new(gateway: Arc<Gateway>, config: Config, startup: StartupInfo) -> Self {
        let extractor = ProfileExtractor::new(gateway.clone(), &config);
        let flow = InvestorFlow::new(gateway.clone(), &config, startup);
        Self {
            gateway,
            config,
            extractor,
            flow,
        }
    }
}
