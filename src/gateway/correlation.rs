//! 结果关联表
//!
//! 指令 id → 单次完成通道。所有者循环执行完毕后直接唤醒对应的等待者，
//! 取代早期实现里"弹出-不是我的-放回去"的轮询扫描，避免多等待者下的
//! 活锁与饥饿。队列只保留在 HTTP 层与所有者循环之间（指令方向）。

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::debug;

use crate::gateway::command::CommandResult;

/// 等待表
///
/// 多个并发提交者注册，唯一的所有者循环完成。
/// 等待者超时弃权后，迟到的结果会被静默丢弃（只记 debug 日志）。
pub struct WaiterTable {
    inner: Mutex<HashMap<String, oneshot::Sender<CommandResult>>>,
}

impl WaiterTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// 注册等待者，必须在指令入队之前调用
    pub fn register(&self, id: &str) -> oneshot::Receiver<CommandResult> {
        let (tx, rx) = oneshot::channel();
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(id.to_string(), tx);
        rx
    }

    /// 投递结果并唤醒等待者
    ///
    /// 等待者已超时弃权（或从未注册）时结果被丢弃，
    /// 这是协议允许的损耗：HTTP 契约是"本次尝试失败"，不是"副作用已回滚"。
    pub fn complete(&self, result: CommandResult) {
        let sender = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.remove(&result.id)
        };
        match sender {
            Some(tx) => {
                if tx.send(result).is_err() {
                    debug!("等待者已放弃，结果被丢弃");
                }
            }
            None => debug!("结果 {} 没有对应的等待者，静默丢弃", result.id),
        }
    }

    /// 撤销登记（等待者超时后调用，避免表无限增长）
    pub fn forget(&self, id: &str) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(id);
    }

    /// 清空全部残留等待者（监督者重启前调用），返回清除数量
    ///
    /// 被清除的等待者会收到通道关闭通知，从而立即失败而非等到超时。
    pub fn clear(&self) -> usize {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let n = map.len();
        map.clear();
        n
    }
}

impl Default for WaiterTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_then_complete() {
        let table = WaiterTable::new();
        let rx = table.register("cmd-1");
        table.complete(CommandResult::ok("cmd-1", json!({"found": true})));
        let result = rx.await.unwrap();
        assert!(result.success);
        assert_eq!(result.id, "cmd-1");
    }

    #[tokio::test]
    async fn test_unmatched_result_is_dropped() {
        let table = WaiterTable::new();
        let rx = table.register("cmd-1");
        // 其他指令的结果不会错投给 cmd-1 的等待者
        table.complete(CommandResult::ok("cmd-2", json!({})));
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), rx)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_clear_notifies_waiters() {
        let table = WaiterTable::new();
        let rx = table.register("cmd-1");
        assert_eq!(table.clear(), 1);
        // 通道被关闭，等待者立即收到错误而不是挂起
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_forget_removes_entry() {
        let table = WaiterTable::new();
        let _rx = table.register("cmd-1");
        table.forget("cmd-1");
        assert_eq!(table.clear(), 0);
    }
}
