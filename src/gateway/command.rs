//! 指令/结果数据模型
//!
//! `Command` 入队后不可变，由所有者循环恰好消费一次；
//! 每条 `Command` 最终恰好产生一条 id 相同的 `CommandResult`。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 选择器类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    #[default]
    Css,
    Xpath,
}

fn default_wait_timeout_ms() -> u64 {
    10_000
}

fn default_scroll_amount() -> i64 {
    500
}

/// 浏览器指令动作
///
/// 线上格式与 HTTP 层保持一致：`{"action": "navigate", "params": {"url": ...}}`。
/// 未知动作在反序列化边界即被拒绝，不会进入所有者循环。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum CommandAction {
    Navigate {
        url: String,
    },
    FindElement {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
    },
    FindElements {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
        #[serde(default)]
        attribute: Option<String>,
    },
    GetText {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
    },
    GetElementText {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
        #[serde(default)]
        index: usize,
    },
    GetAttribute {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
        attribute: String,
    },
    GetPageSource,
    WaitForSelector {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
        /// 毫秒
        #[serde(default = "default_wait_timeout_ms")]
        timeout: u64,
    },
    Click {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
    },
    TypeText {
        selector: String,
        #[serde(default)]
        by: SelectorKind,
        text: String,
    },
    Scroll {
        #[serde(default = "default_scroll_amount")]
        amount: i64,
    },
    Close,
}

impl CommandAction {
    /// 动作名（用于日志与超时错误）
    pub fn name(&self) -> &'static str {
        match self {
            CommandAction::Navigate { .. } => "navigate",
            CommandAction::FindElement { .. } => "find_element",
            CommandAction::FindElements { .. } => "find_elements",
            CommandAction::GetText { .. } => "get_text",
            CommandAction::GetElementText { .. } => "get_element_text",
            CommandAction::GetAttribute { .. } => "get_attribute",
            CommandAction::GetPageSource => "get_page_source",
            CommandAction::WaitForSelector { .. } => "wait_for_selector",
            CommandAction::Click { .. } => "click",
            CommandAction::TypeText { .. } => "type_text",
            CommandAction::Scroll { .. } => "scroll",
            CommandAction::Close => "close",
        }
    }
}

/// 一条入队指令
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// 每次提交唯一
    pub id: String,
    #[serde(flatten)]
    pub action: CommandAction,
}

impl Command {
    /// 创建带新鲜 id 的指令
    pub fn new(action: CommandAction) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
        }
    }
}

/// 指令执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// 与触发指令的 id 相同
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl CommandResult {
    pub fn ok(id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn fail(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }

    /// 附带数据的失败结果（如 `{found: false}`）
    pub fn fail_with(
        id: impl Into<String>,
        error: impl Into<String>,
        data: JsonValue,
    ) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error.into()),
            data: Some(data),
        }
    }

    /// data 中的 found 字段（缺失按 true 处理，便于区分结构化未找到）
    pub fn found(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("found"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }
}

/// 引擎生命周期状态
///
/// `Stopped` 为终态：显式关闭后不再重建。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Starting,
    Ready,
    Degraded,
    Stopped,
}
