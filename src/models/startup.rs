//! 创业公司信息（用于消息起草与领域匹配）

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult, FileError};

/// 创业公司信息
///
/// 从 TOML 文件加载，示例：
///
/// ```toml
/// elevator_pitch = "我们为独立开发者提供一键部署的边缘数据库"
/// sectors = ["devtools", "infrastructure"]
/// pitch_deck_summary = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupInfo {
    /// 电梯演讲
    #[serde(default)]
    pub elevator_pitch: String,
    /// 所属领域
    #[serde(default)]
    pub sectors: Vec<String>,
    /// 融资演示文稿摘要（可选，由外部工具预先生成）
    #[serde(default)]
    pub pitch_deck_summary: String,
}

/// 从 TOML 文件加载创业公司信息
pub async fn load_startup_info(path: &str) -> AppResult<StartupInfo> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::File(FileError::ReadFailed {
            path: path.to_string(),
            source: Box::new(e),
        })
    })?;

    let info: StartupInfo = toml::from_str(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        })
    })?;

    info!(
        "✓ 已加载创业公司信息: {} 个领域, 演讲长度 {} 字符",
        info.sectors.len(),
        info.elevator_pitch.chars().count()
    );

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_startup_toml() {
        let content = r#"
elevator_pitch = "one-click edge databases for indie developers"
sectors = ["devtools", "infrastructure"]
"#;
        let info: StartupInfo = toml::from_str(content).unwrap();
        assert_eq!(info.sectors.len(), 2);
        assert!(info.pitch_deck_summary.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = load_startup_info("does-not-exist.toml").await;
        assert!(result.is_err(), "不存在的文件应该报错");
    }
}
