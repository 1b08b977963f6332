//! HTTP 门面的端到端测试
//!
//! 在随机端口上跑真实的 axum 服务，后端接脚本化桩引擎，
//! 用 reqwest 从外部发请求验证状态码与响应体。

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value as JsonValue};

use seed_pitcher::api::{build_router, AppContext};
use seed_pitcher::gateway::{Gateway, GatewayConfig};
use seed_pitcher::models::startup::StartupInfo;

use common::{test_config, StubFactory, StubScript};

/// 启动一个接桩引擎的完整服务，返回 base URL
async fn spawn_server(script: StubScript) -> String {
    let config = test_config();
    let factory = StubFactory::new(script);
    let gateway = Arc::new(Gateway::new(
        Arc::new(factory),
        GatewayConfig::from_config(&config),
    ));
    gateway.ensure_started().await.expect("网关应该能启动");

    let ctx = Arc::new(AppContext::new(gateway, config, StartupInfo::default()));
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

async fn post_json(url: &str, body: JsonValue) -> (u16, JsonValue) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .expect("请求应该发出去");
    let status = response.status().as_u16();
    let body = response.json::<JsonValue>().await.unwrap_or(JsonValue::Null);
    (status, body)
}

async fn get_json(url: &str) -> (u16, JsonValue) {
    let response = reqwest::get(url).await.expect("请求应该发出去");
    let status = response.status().as_u16();
    let body = response.json::<JsonValue>().await.unwrap_or(JsonValue::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_structural_breakdown() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = get_json(&format!("{}/health", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["state"], "ready");
    assert_eq!(body["detail"]["has_browser"], true);
    assert_eq!(body["detail"]["has_page"], true);
}

#[tokio::test]
async fn test_navigate_requires_url() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(&format!("{}/navigate", base), json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "url is required");
}

#[tokio::test]
async fn test_navigate_success() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(
        &format!("{}/navigate", base),
        json!({"url": "https://example.com"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["url"], "https://example.com");
}

/// 不可达主机：耗尽配置的重试次数后返回结构化失败，不会无限挂起
#[tokio::test]
async fn test_navigate_unreachable_host_fails_in_bounded_time() {
    let script = StubScript {
        fail_navigate: true,
        ..StubScript::investor_profile()
    };
    let base = spawn_server(script).await;

    let started = Instant::now();
    let (status, body) = post_json(
        &format!("{}/navigate", base),
        json!({"url": "https://unreachable.invalid"}),
    )
    .await;
    let elapsed = started.elapsed();

    assert_eq!(status, 500);
    let error = body["error"].as_str().unwrap();
    assert!(
        error.contains("failed to navigate after 2 attempts"),
        "错误信息应该说明重试耗尽: {}",
        error
    );
    // 2 次尝试 + 1 次就地恢复，必须远小于无限挂起
    assert!(elapsed < Duration::from_secs(10), "耗时 {:?} 超出预期", elapsed);
}

#[tokio::test]
async fn test_find_element_missing_selector_is_400() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, _) = post_json(&format!("{}/find_element", base), json!({})).await;
    assert_eq!(status, 400);
}

/// 选择器匹配不到任何元素：404 + found:false，而不是 500
#[tokio::test]
async fn test_find_element_not_found_is_404() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(
        &format!("{}/find_element", base),
        json!({"selector": "div.does-not-exist"}),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["found"], false);
    assert_eq!(body["status"], "not_found");
}

#[tokio::test]
async fn test_find_element_returns_text() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(
        &format!("{}/find_element", base),
        json!({"selector": "div.text-body-medium"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["found"], true);
    assert_eq!(body["text"], "Partner at Early Stage Ventures");
}

#[tokio::test]
async fn test_find_elements_not_found_is_404() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, _) = post_json(
        &format!("{}/find_elements", base),
        json!({"selector": "li.nothing"}),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_scroll_defaults_amount() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(&format!("{}/scroll", base), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "scrolled page by 500");
}

/// 端到端：抽取档案 → 关键词分析
#[tokio::test]
async fn test_linkedin_profile_end_to_end() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(
        &format!("{}/linkedin_profile", base),
        json!({"url": "https://www.linkedin.com/in/example"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["profile"]["name"], "Jane Doe");
    assert_eq!(body["profile"]["headline"], "Partner at Early Stage Ventures");

    let analysis = &body["analysis"];
    assert_eq!(analysis["is_investor"], true);

    let confidence = analysis["confidence"].as_f64().unwrap();
    assert!(
        (0.5..=0.95).contains(&confidence),
        "置信度 {} 应该落在 [0.5, 0.95]",
        confidence
    );

    let keywords: Vec<String> = analysis["investor_keywords_found"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    assert!(keywords.iter().any(|k| k == "partner"));
    assert!(keywords.iter().any(|k| k == "early stage"));
}

/// GET 形式的档案抽取（兼容旧调用方）
#[tokio::test]
async fn test_linkedin_profile_via_query_param() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = get_json(&format!(
        "{}/extract_linkedin_profile?url=https://www.linkedin.com/in/example",
        base
    ))
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["analysis"]["is_investor"], true);
}

/// 连续两次 /close 都返回成功，且循环保持停止
#[tokio::test]
async fn test_close_twice_is_idempotent() {
    let base = spawn_server(StubScript::investor_profile()).await;

    let (status, body) = post_json(&format!("{}/close", base), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let (status, body) = post_json(&format!("{}/close", base), json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let (_, health) = get_json(&format!("{}/health", base)).await;
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["state"], "stopped");
}
