//! LLM 服务 - 业务能力层
//!
//! 只负责"LLM 判断"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::models::profile::{InvestorAnalysis, ProfileSignals, WebInfo};

/// 提示词里嵌入的语料上限（字符）
const MAX_CORPUS_CHARS: usize = 10_000;

/// LLM 服务
///
/// 职责：
/// - 提供通用的 LLM 调用接口
/// - 档案深度分析与搜索语料结构化抽取
/// - 不出现指令队列 / 网关
/// - 不关心流程顺序
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 这是最基础的 LLM 调用接口，其他所有 LLM 相关功能都基于此函数。
    ///
    /// # 参数
    /// - `user_message`: 用户消息内容
    /// - `system_message`: 系统消息（可选）
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（字符串）
    pub async fn send_to_llm(
        &self,
        user_message: &str,
        system_message: Option<&str>,
    ) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        // 构建消息列表
        let mut messages = Vec::new();

        if let Some(sys_msg) = system_message {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()
                .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(1024u32)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("LLM API 调用成功");

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AppError::Llm(LlmError::EmptyContent {
                    model: self.model_name.clone(),
                })
            })?;

        Ok(content.trim().to_string())
    }

    /// 深度分析档案是否属于投资人
    ///
    /// 返回结构化分析；LLM 输出无法解析时退回保守的空分析
    /// （is_investor = false），并把解析失败写进 reasoning。
    pub async fn analyze_profile(&self, profile: &ProfileSignals) -> AppResult<InvestorAnalysis> {
        let experience = if profile.experience.is_empty() {
            "(none)".to_string()
        } else {
            profile
                .experience
                .iter()
                .map(|entry| format!("- {}", entry))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user_message = format!(
            r#"You are an expert in analyzing professional profiles to identify investors.

Please analyze the following profile information and determine if this person is likely an investor
(e.g. venture capitalist, angel investor, investment manager, etc.).

Profile data:
Name: {}
Headline: {}
Current company: {}
About: {}

Experience:
{}

Fund name (if any): {}

Respond with a JSON object containing the following fields:
- is_investor: boolean indicating if this person is likely an investor
- investor_type: string (e.g. "VC", "Angel", "LP", etc.) if is_investor is true
- confidence: number between 0 and 1 indicating your confidence
- fund_name: string with the fund name if available
- investment_focus: list of strings representing investment focus areas
- reasoning: string explaining your analysis

Return only the JSON object, no other text."#,
            profile.name.as_deref().unwrap_or(""),
            profile.headline.as_deref().unwrap_or(""),
            profile.company.as_deref().unwrap_or(""),
            profile.about.as_deref().unwrap_or(""),
            experience,
            profile.fund.as_deref().unwrap_or(""),
        );

        let response = self.send_to_llm(&user_message, None).await?;

        match Self::parse_json_block(&response) {
            Some(value) => match serde_json::from_value::<InvestorAnalysis>(value) {
                Ok(analysis) => {
                    debug!(
                        "LLM 分析完成: is_investor={} confidence={:.2}",
                        analysis.is_investor, analysis.confidence
                    );
                    Ok(analysis)
                }
                Err(e) => {
                    warn!("LLM 分析结果字段不符: {}", e);
                    Ok(Self::fallback_analysis(&response))
                }
            },
            None => {
                warn!("无法从 LLM 响应中定位 JSON: {}", response);
                Ok(Self::fallback_analysis(&response))
            }
        }
    }

    /// 从搜索语料中抽取投资人结构化信息
    ///
    /// # 参数
    /// - `name`: 投资人姓名
    /// - `company_or_fund`: 公司或基金名
    /// - `corpus`: 拼接后的搜索结果正文
    pub async fn extract_web_info(
        &self,
        name: &str,
        company_or_fund: &str,
        corpus: &str,
    ) -> AppResult<WebInfo> {
        let limited: String = corpus.chars().take(MAX_CORPUS_CHARS).collect();

        let user_message = format!(
            r#"You are an expert in analyzing information about investors. I will provide you with text from web search
results about an investor, and I need you to extract key information about them.

Investor name: {}
Company/Fund: {}

Web search results:
{}

Based on these search results, extract the following information in JSON format:
- recent_investments: A list of the investor's most recent investments (company names)
- investment_stages: A list of investment stages they focus on (e.g., "Seed", "Series A", etc.)
- investment_sectors: A list of sectors/industries they invest in

If the information isn't available in the search results, use empty lists.
Return only the JSON object, no other text."#,
            name, company_or_fund, limited
        );

        let response = self.send_to_llm(&user_message, None).await?;

        match Self::parse_json_block(&response)
            .and_then(|value| serde_json::from_value::<WebInfo>(value).ok())
        {
            Some(info) => Ok(info),
            None => {
                // 解析失败返回空结构，富集信号缺席但流程可以继续
                warn!("无法解析搜索语料抽取结果，返回空信息");
                Ok(WebInfo::default())
            }
        }
    }

    /// 在响应文本中定位 JSON 对象（容忍 markdown 代码块等包装）
    fn parse_json_block(response: &str) -> Option<JsonValue> {
        let trimmed = response.trim();

        // 先尝试整体解析
        if let Ok(value) = serde_json::from_str::<JsonValue>(trimmed) {
            if value.is_object() {
                return Some(value);
            }
        }

        // 回退：截取第一个 '{' 到最后一个 '}' 之间的内容
        let start = trimmed.find('{')?;
        let end = trimmed.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<JsonValue>(&trimmed[start..=end])
            .ok()
            .filter(|value| value.is_object())
    }

    /// 解析彻底失败时的保守分析结果
    fn fallback_analysis(response: &str) -> InvestorAnalysis {
        InvestorAnalysis {
            is_investor: false,
            confidence: 0.0,
            reasoning: format!("Error parsing response: {}", response),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_block_direct() {
        let value = LlmService::parse_json_block(r#"{"is_investor": true, "confidence": 0.8}"#);
        assert_eq!(value.unwrap()["is_investor"], true);
    }

    #[test]
    fn test_parse_json_block_fenced() {
        let response = "Here is my analysis:\n```json\n{\"is_investor\": false, \"confidence\": 0.1}\n```";
        let value = LlmService::parse_json_block(response).unwrap();
        assert_eq!(value["confidence"], 0.1);
    }

    #[test]
    fn test_parse_json_block_rejects_garbage() {
        assert!(LlmService::parse_json_block("sorry, I cannot help with that").is_none());
    }

    #[test]
    fn test_fallback_analysis_is_conservative() {
        let analysis = LlmService::fallback_analysis("not json");
        assert!(!analysis.is_investor);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.reasoning.contains("not json"));
    }

    #[test]
    fn test_investor_analysis_tolerates_partial_json() {
        let analysis: InvestorAnalysis =
            serde_json::from_value(serde_json::json!({"is_investor": true})).unwrap();
        assert!(analysis.is_investor);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.investment_focus.is_empty());
    }
}
