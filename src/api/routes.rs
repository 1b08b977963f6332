//! HTTP 路由定义
//!
//! ```text
//! GET  /health                   - 结构化健康状况
//! POST /navigate                 - 导航（带重试）
//! GET  /page_source              - 当前页面源码
//! POST /find_element             - 查找单个元素（可取文本/属性）
//! POST /find_elements            - 查找全部匹配元素
//! POST /click                    - 点击元素
//! POST /type_text                - 输入文本
//! POST /scroll                   - 滚动页面
//! POST /wait_for_element         - 等待元素出现
//! GET|POST /linkedin_profile     - 复合：抽取档案 + 关键词分析
//! GET|POST /extract_linkedin_profile - 同上（兼容旧路径）
//! POST /analyze_investor         - 复合：完整投资人分析流程
//! POST /close                    - 幂等关闭
//! ```

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::{handlers, AppContext};

/// 组装路由
pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/navigate", post(handlers::navigate))
        .route("/page_source", get(handlers::page_source))
        .route("/find_element", post(handlers::find_element))
        .route("/find_elements", post(handlers::find_elements))
        .route("/click", post(handlers::click))
        .route("/type_text", post(handlers::type_text))
        .route("/scroll", post(handlers::scroll))
        .route("/wait_for_element", post(handlers::wait_for_element))
        .route(
            "/linkedin_profile",
            get(handlers::linkedin_profile_query).post(handlers::linkedin_profile_body),
        )
        // 兼容旧端点路径
        .route(
            "/extract_linkedin_profile",
            get(handlers::linkedin_profile_query).post(handlers::linkedin_profile_body),
        )
        .route("/analyze_investor", post(handlers::analyze_investor))
        .route("/close", post(handlers::close))
        .with_state(ctx)
}
