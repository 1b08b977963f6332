//! 序列化网关的并发与生命周期测试
//!
//! 全部使用脚本化桩引擎，不依赖真实浏览器。

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use seed_pitcher::error::{AppError, GatewayError};
use seed_pitcher::gateway::{CommandAction, EngineState, Gateway};

use common::{spawn_gateway, test_gateway_config, StubFactory, StubScript};

fn find_element_action() -> CommandAction {
    CommandAction::FindElement {
        selector: "h1.text-heading-xlarge".to_string(),
        by: Default::default(),
    }
}

/// 每条提交的指令恰好得到一条结果（运行期间没有静默丢失）
#[tokio::test]
async fn test_every_command_gets_exactly_one_result() {
    let (gateway, probes) = spawn_gateway(StubScript::investor_profile()).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .submit(find_element_action(), Duration::from_secs(5))
                .await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().expect("指令应该得到结果");
        assert!(result.success);
    }

    assert_eq!(probes.operations.load(Ordering::SeqCst), 10);
}

/// 任何时刻最多一条指令在引擎上执行（互斥不变量）
#[tokio::test]
async fn test_commands_never_overlap_on_engine() {
    let script = StubScript {
        op_delay: Duration::from_millis(20),
        ..StubScript::investor_profile()
    };
    let (gateway, probes) = spawn_gateway(script).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway
                .submit(find_element_action(), Duration::from_secs(10))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(
        probes.max_in_flight.load(Ordering::SeqCst),
        1,
        "并发峰值必须是 1"
    );
}

/// 提交顺序被单一所有者循环按 FIFO 处理
#[tokio::test]
async fn test_sequential_commands_complete_in_order() {
    let (gateway, probes) = spawn_gateway(StubScript::investor_profile()).await;

    for _ in 0..5 {
        let result = gateway
            .submit(find_element_action(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.success);
    }
    assert_eq!(probes.operations.load(Ordering::SeqCst), 5);
}

/// 超时是独立的错误类别，且不影响循环处理后续指令
#[tokio::test]
async fn test_submit_timeout_is_distinguishable() {
    let script = StubScript {
        op_delay: Duration::from_millis(300),
        ..StubScript::investor_profile()
    };
    let (gateway, _probes) = spawn_gateway(script).await;

    let err = gateway
        .submit(find_element_action(), Duration::from_millis(50))
        .await
        .expect_err("50ms 截止时间应该超时");
    assert!(err.is_timeout(), "错误应该是超时类别: {}", err);

    // 迟到的结果被静默丢弃，循环继续服务新指令
    let result = gateway
        .submit(find_element_action(), Duration::from_secs(5))
        .await
        .expect("后续指令应该正常完成");
    assert!(result.success);
}

/// 关闭是幂等的，关闭后所有者循环保持停止
#[tokio::test]
async fn test_close_is_idempotent_and_terminal() {
    let (gateway, probes) = spawn_gateway(StubScript::investor_profile()).await;

    let first = gateway.close().await.expect("第一次关闭应该成功");
    assert!(first.success);
    let second = gateway.close().await.expect("重复关闭同样成功");
    assert!(second.success);

    assert_eq!(gateway.state().await, EngineState::Stopped);
    assert!(probes.closes.load(Ordering::SeqCst) >= 1);

    // 终态：不接受新指令，也不允许重建
    let err = gateway
        .submit(find_element_action(), Duration::from_secs(1))
        .await
        .expect_err("关闭后不应接受指令");
    assert!(matches!(err, AppError::Gateway(GatewayError::NotRunning)));

    let err = gateway.ensure_started().await.expect_err("关闭后不应重建");
    assert!(matches!(err, AppError::Gateway(GatewayError::Closed)));
}

/// 引擎起不来：监督者在限定时间内报告失败，进程不崩溃
#[tokio::test]
async fn test_startup_failure_is_reported() {
    let factory = StubFactory::failing(StubScript::default(), usize::MAX);
    let probes = factory.probes.clone();
    let gateway = Gateway::new(Arc::new(factory), test_gateway_config());

    let err = gateway.ensure_started().await.expect_err("启动应该失败");
    assert!(matches!(
        err,
        AppError::Gateway(GatewayError::StartupFailed { .. })
    ));

    // 有界重试：init_attempts = 2
    assert_eq!(probes.builds.load(Ordering::SeqCst), 2);

    let report = gateway.health().await;
    assert!(!report.healthy());
}

/// 幂等启动：重复 ensure_started 不会再起一个循环
#[tokio::test]
async fn test_ensure_started_is_idempotent() {
    let (gateway, probes) = spawn_gateway(StubScript::investor_profile()).await;

    gateway.ensure_started().await.unwrap();
    gateway.ensure_started().await.unwrap();

    assert_eq!(probes.builds.load(Ordering::SeqCst), 1);
}

/// 降级恢复：restart 重建引擎后网关继续可用
#[tokio::test]
async fn test_restart_recovers_gateway() {
    let (gateway, probes) = spawn_gateway(StubScript::investor_profile()).await;

    let result = gateway
        .submit(find_element_action(), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(result.success);

    gateway.restart().await.expect("恢复应该成功");

    let result = gateway
        .submit(find_element_action(), Duration::from_secs(5))
        .await
        .expect("恢复后指令应该正常完成");
    assert!(result.success);

    assert_eq!(probes.builds.load(Ordering::SeqCst), 2);

    // 旧循环在一个轮询间隔内观察到停机标志并关闭旧引擎
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(probes.closes.load(Ordering::SeqCst) >= 1);
}

/// 执行失败被包装成失败结果，而不是打断所有者循环
#[tokio::test]
async fn test_engine_error_becomes_failed_result() {
    let script = StubScript {
        fail_navigate: true,
        ..StubScript::investor_profile()
    };
    let (gateway, _probes) = spawn_gateway(script).await;

    let result = gateway
        .submit(
            CommandAction::Navigate {
                url: "https://unreachable.invalid".to_string(),
            },
            Duration::from_secs(5),
        )
        .await
        .expect("失败也要有结果");
    assert!(!result.success);
    assert!(result.error.unwrap().contains("ERR_NAME_NOT_RESOLVED"));

    // 循环仍然存活
    let result = gateway
        .submit(find_element_action(), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(result.success);
}
