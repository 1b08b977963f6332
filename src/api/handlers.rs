//! HTTP 端点处理器
//!
//! 每个处理器：校验参数（缺失 → 400）→ 确认引擎就绪（未就绪先触发
//! 监督者启动，仍失败 → 500）→ 构造指令并经关联协议等待结果 →
//! 把结果映射到状态码：成功 → 200；结构化未找到（found:false）→ 404；
//! 执行出错 → 500；协议超时 → 500（带明确的 timeout 标记）。

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::AppContext;
use crate::error::{AppError, BrowserError, GatewayError};
use crate::gateway::command::{CommandAction, CommandResult, EngineState, SelectorKind};
use crate::services::investor_scoring;

// ========== 请求体 ==========
// 必填字段用 Option 建模，缺失时统一返回 400 而不是框架层的 422

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FindElementRequest {
    pub selector: Option<String>,
    #[serde(default)]
    pub by: SelectorKind,
    pub attribute: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub selector: Option<String>,
    #[serde(default)]
    pub by: SelectorKind,
}

#[derive(Debug, Deserialize)]
pub struct TypeTextRequest {
    pub selector: Option<String>,
    #[serde(default)]
    pub by: SelectorKind,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScrollRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WaitForElementRequest {
    pub selector: Option<String>,
    #[serde(default)]
    pub by: SelectorKind,
    /// 毫秒
    pub timeout: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileRequest {
    pub url: Option<String>,
}

// ========== 响应辅助 ==========

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "not_found", "found": false, "message": message })),
    )
        .into_response()
}

/// 提交阶段的错误 → 响应
///
/// 协议超时必须与执行失败可区分（错误体里带明确的 timeout 标记）。
fn submit_error(err: AppError) -> Response {
    match &err {
        AppError::Gateway(GatewayError::Timeout { action, .. }) => {
            internal_error(format!("timeout waiting for {} result", action))
        }
        AppError::Gateway(GatewayError::NotRunning) => {
            internal_error("browser thread not running".to_string())
        }
        AppError::Gateway(GatewayError::Closed) => {
            internal_error("browser gateway closed".to_string())
        }
        _ => internal_error(err.to_string()),
    }
}

/// 确认引擎就绪；未就绪时触发监督者启动
async fn ensure_ready(ctx: &AppContext) -> Result<(), Response> {
    if ctx.gateway.state().await == EngineState::Ready {
        return Ok(());
    }
    info!("引擎未就绪，触发监督者启动");
    ctx.gateway.ensure_started().await.map_err(|e| {
        error!("引擎启动失败: {}", e);
        internal_error(format!("failed to initialize browser: {}", e))
    })
}

fn command_deadline(ctx: &AppContext) -> Duration {
    Duration::from_secs(ctx.config.command_timeout_secs)
}

fn element_deadline(ctx: &AppContext) -> Duration {
    Duration::from_secs(ctx.config.element_timeout_secs)
}

fn data_field<'a>(result: &'a CommandResult, key: &str) -> Option<&'a JsonValue> {
    result.data.as_ref().and_then(|d| d.get(key))
}

// ========== 端点 ==========

/// GET /health
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Response {
    let report = ctx.gateway.health().await;
    let status = if report.healthy() {
        "healthy"
    } else {
        "unhealthy"
    };
    Json(json!({
        "status": status,
        "state": report.state,
        "running": report.running,
        "detail": report.detail,
    }))
    .into_response()
}

/// POST /navigate
///
/// 配置次数内重试；全部失败时就地做一次降级恢复，再报告结构化失败。
pub async fn navigate(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<NavigateRequest>,
) -> Response {
    let Some(url) = req.url.filter(|u| !u.is_empty()) else {
        return bad_request("url is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    let attempts = ctx.config.navigation_attempts;
    let mut last_error = String::new();

    for attempt in 0..attempts {
        let result = ctx
            .gateway
            .submit(
                CommandAction::Navigate { url: url.clone() },
                command_deadline(&ctx),
            )
            .await;

        match result {
            Ok(r) if r.success => {
                info!("✓ 导航成功: {}", url);
                return Json(json!({ "status": "success", "url": url })).into_response();
            }
            Ok(r) => last_error = r.error.unwrap_or_default(),
            Err(e) if e.is_timeout() => last_error = format!("timeout: {}", e),
            Err(e) => last_error = e.to_string(),
        }
        warn!("导航失败 (尝试 {}/{}): {}", attempt + 1, attempts, last_error);
        if attempt + 1 < attempts {
            sleep(Duration::from_secs(1)).await;
        }
    }

    // 重试耗尽：关闭引擎并重新请求监督者，然后才向调用方报告失败
    warn!("导航重试耗尽，尝试就地恢复引擎");
    if let Err(e) = ctx.gateway.restart().await {
        error!("引擎恢复失败: {}", e);
    }

    internal_error(format!(
        "failed to navigate after {} attempts: {}",
        attempts, last_error
    ))
}

/// GET /page_source
pub async fn page_source(State(ctx): State<Arc<AppContext>>) -> Response {
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }
    match ctx
        .gateway
        .submit(CommandAction::GetPageSource, command_deadline(&ctx))
        .await
    {
        Ok(r) if r.success => {
            let source = data_field(&r, "content")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Json(json!({ "status": "success", "source": source })).into_response()
        }
        Ok(r) => internal_error(
            r.error
                .unwrap_or_else(|| "unknown error getting page source".to_string()),
        ),
        Err(e) => submit_error(e),
    }
}

/// POST /find_element
///
/// 找到后按需追加第二条指令取文本或属性值（与单指令的 find 语义
/// 保持独立，两条指令之间允许其他调用者的指令插队）。
pub async fn find_element(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<FindElementRequest>,
) -> Response {
    let Some(selector) = req.selector.filter(|s| !s.is_empty()) else {
        return bad_request("selector is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    let found = ctx
        .gateway
        .submit(
            CommandAction::FindElement {
                selector: selector.clone(),
                by: req.by,
            },
            element_deadline(&ctx),
        )
        .await;

    let result = match found {
        Ok(r) => r,
        Err(e) => return submit_error(e),
    };

    if !result.success {
        return not_found(
            result
                .error
                .unwrap_or_else(|| format!("element not found: {}", selector)),
        );
    }

    let mut body = json!({ "status": "success", "found": true });

    match req.attribute {
        Some(attribute) if !attribute.is_empty() => {
            let attr = ctx
                .gateway
                .submit(
                    CommandAction::GetAttribute {
                        selector,
                        by: req.by,
                        attribute,
                    },
                    element_deadline(&ctx),
                )
                .await;
            if let Ok(r) = attr {
                if let Some(value) = data_field(&r, "attribute_value").and_then(|v| v.as_str()) {
                    body["attribute_value"] = json!(value);
                }
            }
        }
        _ => {
            let text = ctx
                .gateway
                .submit(
                    CommandAction::GetText {
                        selector,
                        by: req.by,
                    },
                    element_deadline(&ctx),
                )
                .await;
            if let Ok(r) = text {
                if let Some(value) = data_field(&r, "text").and_then(|v| v.as_str()) {
                    body["text"] = json!(value);
                }
            }
        }
    }

    Json(body).into_response()
}

/// POST /find_elements
pub async fn find_elements(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<FindElementRequest>,
) -> Response {
    let Some(selector) = req.selector.filter(|s| !s.is_empty()) else {
        return bad_request("selector is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    let wants_attribute = req.attribute.is_some();
    let result = ctx
        .gateway
        .submit(
            CommandAction::FindElements {
                selector: selector.clone(),
                by: req.by,
                attribute: req.attribute,
            },
            element_deadline(&ctx),
        )
        .await;

    let result = match result {
        Ok(r) => r,
        Err(e) => return submit_error(e),
    };
    if !result.success {
        return internal_error(result.error.unwrap_or_default());
    }

    let count = data_field(&result, "count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    if count == 0 {
        return not_found(format!("no elements found with selector {}", selector));
    }

    // 线上格式与抓取端约定一致：每个条目只带 text 或 attribute_value
    let elements: Vec<JsonValue> = data_field(&result, "elements")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    if wants_attribute {
                        json!({ "attribute_value": item.get("attribute_value") })
                    } else {
                        json!({ "text": item.get("text") })
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({ "status": "success", "elements": elements, "count": count })).into_response()
}

/// POST /click
pub async fn click(State(ctx): State<Arc<AppContext>>, Json(req): Json<ClickRequest>) -> Response {
    let Some(selector) = req.selector.filter(|s| !s.is_empty()) else {
        return bad_request("selector is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    match ctx
        .gateway
        .submit(
            CommandAction::Click {
                selector: selector.clone(),
                by: req.by,
            },
            command_deadline(&ctx),
        )
        .await
    {
        Ok(r) if r.success => Json(json!({
            "status": "success",
            "message": format!("clicked element with selector {}", selector),
        }))
        .into_response(),
        Ok(r) if !r.found() => {
            not_found(format!("element not found with selector {}", selector))
        }
        Ok(r) => internal_error(r.error.unwrap_or_default()),
        Err(e) => submit_error(e),
    }
}

/// POST /type_text
pub async fn type_text(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<TypeTextRequest>,
) -> Response {
    let Some(selector) = req.selector.filter(|s| !s.is_empty()) else {
        return bad_request("selector is required");
    };
    let Some(text) = req.text else {
        return bad_request("text is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    match ctx
        .gateway
        .submit(
            CommandAction::TypeText {
                selector: selector.clone(),
                by: req.by,
                text,
            },
            command_deadline(&ctx),
        )
        .await
    {
        Ok(r) if r.success => Json(json!({
            "status": "success",
            "message": format!("typed text into element with selector {}", selector),
        }))
        .into_response(),
        Ok(r) if !r.found() => {
            not_found(format!("element not found with selector {}", selector))
        }
        Ok(r) => internal_error(r.error.unwrap_or_default()),
        Err(e) => submit_error(e),
    }
}

/// POST /scroll
pub async fn scroll(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<ScrollRequest>,
) -> Response {
    let amount = req.amount.unwrap_or(500);
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    match ctx
        .gateway
        .submit(CommandAction::Scroll { amount }, command_deadline(&ctx))
        .await
    {
        Ok(r) if r.success => Json(json!({
            "status": "success",
            "message": format!("scrolled page by {}", amount),
        }))
        .into_response(),
        Ok(r) => internal_error(r.error.unwrap_or_default()),
        Err(e) => submit_error(e),
    }
}

/// POST /wait_for_element
pub async fn wait_for_element(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<WaitForElementRequest>,
) -> Response {
    let Some(selector) = req.selector.filter(|s| !s.is_empty()) else {
        return bad_request("selector is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    let timeout_ms = req.timeout.unwrap_or(10_000);
    // 等待类指令的截止时间要覆盖引擎侧的轮询窗口
    let deadline = Duration::from_millis(timeout_ms) + element_deadline(&ctx);

    match ctx
        .gateway
        .submit(
            CommandAction::WaitForSelector {
                selector: selector.clone(),
                by: req.by,
                timeout: timeout_ms,
            },
            deadline,
        )
        .await
    {
        Ok(r) if r.success && r.found() => Json(json!({
            "status": "success",
            "message": format!("element with selector {} appeared", selector),
        }))
        .into_response(),
        Ok(r) if r.success => Json(json!({
            "status": "timeout",
            "message": format!(
                "element with selector {} did not appear within timeout",
                selector
            ),
        }))
        .into_response(),
        Ok(r) => internal_error(r.error.unwrap_or_default()),
        Err(e) => submit_error(e),
    }
}

/// GET /linkedin_profile?url=...
pub async fn linkedin_profile_query(
    State(ctx): State<Arc<AppContext>>,
    Query(req): Query<ProfileRequest>,
) -> Response {
    extract_profile(ctx, req.url).await
}

/// POST /linkedin_profile {url}
pub async fn linkedin_profile_body(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<ProfileRequest>,
) -> Response {
    extract_profile(ctx, req.url).await
}

/// 复合操作：抽取档案并做关键词分析
async fn extract_profile(ctx: Arc<AppContext>, url: Option<String>) -> Response {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return bad_request("url is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    info!("📋 抽取 LinkedIn 档案: {}", url);

    let signals = match ctx.extractor.extract(&url).await {
        Ok(signals) => signals,
        Err(AppError::Browser(BrowserError::NavigationExhausted { attempts, .. })) => {
            // 导航彻底失败：先就地恢复引擎，再报告结构化失败
            warn!("档案导航失败 (重试 {} 次)，尝试恢复引擎", attempts);
            if let Err(e) = ctx.gateway.restart().await {
                error!("引擎恢复失败: {}", e);
            }
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "error": "failed to navigate to LinkedIn profile after multiple attempts",
                })),
            )
                .into_response();
        }
        Err(e) => return submit_error(e),
    };

    let analysis = investor_scoring::analyze_keywords(&signals);
    info!(
        "✓ 档案分析完成: 投资人={} 置信度={:.2}",
        analysis.is_investor, analysis.confidence
    );

    Json(json!({
        "status": "success",
        "profile": {
            "url": signals.url,
            "name": signals.name,
            "headline": signals.headline,
            "about": signals.about,
            "experience": signals.experience,
            "investment_roles": analysis.investor_keywords_found,
            "is_investor": analysis.is_investor,
        },
        "analysis": {
            "is_investor": analysis.is_investor,
            "confidence": analysis.confidence,
            "url": signals.url,
            "investor_keywords_found": analysis.investor_keywords_found,
            "breakdown": analysis.breakdown,
        },
    }))
    .into_response()
}

/// POST /analyze_investor {url}
///
/// 完整流程：抽取 → LLM 分析 → 网络富集 → 综合评分 → 起草消息
pub async fn analyze_investor(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<ProfileRequest>,
) -> Response {
    let Some(url) = req.url.filter(|u| !u.is_empty()) else {
        return bad_request("url is required");
    };
    if let Err(resp) = ensure_ready(&ctx).await {
        return resp;
    }

    match ctx.flow.run(&url).await {
        Ok(report) => Json(json!({ "status": "success", "report": report })).into_response(),
        Err(AppError::Browser(BrowserError::NavigationExhausted { .. })) => {
            if let Err(e) = ctx.gateway.restart().await {
                error!("引擎恢复失败: {}", e);
            }
            internal_error("failed to navigate to profile after multiple attempts".to_string())
        }
        Err(e) => {
            error!("投资人分析失败: {}", e);
            submit_error(e)
        }
    }
}

/// POST /close
///
/// 幂等：重复关闭同样返回成功
pub async fn close(State(ctx): State<Arc<AppContext>>) -> Response {
    match ctx.gateway.close().await {
        Ok(result) => {
            let message = data_field(&result, "message")
                .and_then(|v| v.as_str())
                .unwrap_or("browser close command sent")
                .to_string();
            Json(json!({ "status": "success", "message": message })).into_response()
        }
        Err(e) => internal_error(e.to_string()),
    }
}
