//! 触达消息起草 - 业务能力层
//!
//! 基于档案、分析结果与创业公司信息，让 LLM 起草一封个性化的
//! 初次触达消息。纯提示词工程，无状态。

use tracing::debug;

use crate::error::AppResult;
use crate::models::profile::{InvestorAnalysis, ProfileSignals, WebInfo};
use crate::models::startup::StartupInfo;
use crate::services::llm_service::LlmService;

/// 起草一封发给投资人的触达消息
pub async fn draft_message(
    llm: &LlmService,
    profile: &ProfileSignals,
    analysis: &InvestorAnalysis,
    web_info: &WebInfo,
    startup: &StartupInfo,
) -> AppResult<String> {
    let investor_company = profile
        .company
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| analysis.fund_name.clone());

    // 最多引用三笔近期投资，避免消息读起来像调查报告
    let recent_investments = web_info
        .recent_investments
        .iter()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let user_message = format!(
        r#"You are an expert in crafting effective fundraising messages for startups to send to potential investors.
Your task is to draft a personalized message from a startup founder to a potential investor.

### Investor Information:
- Name: {}
- Current position: {}
- Fund/Company: {}
- Investment focus: {}
- Recent investments: {}

### Startup Information:
- Elevator pitch: {}
- Additional details from pitch deck: {}

Draft a personalized, concise message (max 300 words) to this investor that:
1. Establishes a personal connection if possible
2. Briefly introduces the startup and its value proposition
3. Explains why this specific investor would be interested (based on their investment focus)
4. Mentions recent investments they've made only if relevant
5. Requests a brief call or meeting to discuss further
6. Maintains a professional but conversational tone
7. Avoids generic phrases that could apply to any investor

IMPORTANT GUIDELINES:
- Keep it brief and to the point
- Personalize for this specific investor
- Focus on value proposition, not just features
- Don't oversell or use hyperbole
- Be respectful of their time
- Don't attach any files or suggest sharing documents yet

The message should feel like it was written specifically for this investor, not a template."#,
        profile.name.as_deref().unwrap_or(""),
        profile.headline.as_deref().unwrap_or(""),
        investor_company,
        analysis.investment_focus.join(", "),
        recent_investments,
        startup.elevator_pitch,
        startup.pitch_deck_summary,
    );

    debug!("起草触达消息，投资人: {:?}", profile.name);
    llm.send_to_llm(&user_message, None).await
}
