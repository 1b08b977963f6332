//! 投资人分析流程 - 流程层
//!
//! 核心职责：定义"一位投资人"的完整分析流程
//!
//! 流程顺序：
//! 1. 抽取档案 → 关键词初筛
//! 2. LLM 深度分析（失败退回初筛结果）
//! 3. 网络搜索富集 → 综合评分
//! 4. 达标时起草触达消息

use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::search_client::SearchClient;
use crate::config::Config;
use crate::error::AppResult;
use crate::gateway::supervisor::Gateway;
use crate::models::profile::{InvestorAnalysis, InvestorReport, ProfileSignals, WebInfo};
use crate::models::startup::StartupInfo;
use crate::services::investor_scoring;
use crate::services::llm_service::LlmService;
use crate::services::message_drafter;
use crate::services::profile_extractor::ProfileExtractor;
use crate::utils::logging::truncate_text;

/// 投资人分析流程
///
/// - 编排完整的分析流程
/// - 决定何时抽取、何时分析、何时兜底
/// - 不持有任何引擎资源
/// - 只依赖业务能力（services）
pub struct InvestorFlow {
    extractor: ProfileExtractor,
    llm_service: LlmService,
    search_client: SearchClient,
    startup: StartupInfo,
    investor_threshold: f64,
    fallback_confidence: f64,
}

impl InvestorFlow {
    /// 创建新的分析流程
    pub fn new(gateway: Arc<Gateway>, config: &Config, startup: StartupInfo) -> Self {
        Self {
            extractor: ProfileExtractor::new(gateway, config),
            llm_service: LlmService::new(config),
            search_client: SearchClient::new(config),
            startup,
            investor_threshold: config.investor_threshold,
            fallback_confidence: config.fallback_confidence,
        }
    }

    /// 对一个档案 URL 跑完整分析流程
    pub async fn run(&self, url: &str) -> AppResult<InvestorReport> {
        info!("🔍 开始分析投资人档案: {}", url);

        // ========== 流程 1: 抽取 + 关键词初筛 ==========
        let profile = self.extractor.extract(url).await?;

        if let Some(headline) = &profile.headline {
            info!("头衔: {}", truncate_text(headline, 80));
        }

        let keyword_analysis = investor_scoring::analyze_keywords(&profile);
        info!(
            "✓ 关键词初筛: 投资人={} 置信度={:.2} (命中 {} 个关键词)",
            keyword_analysis.is_investor,
            keyword_analysis.confidence,
            keyword_analysis.keyword_matches
        );

        // ========== 流程 2: LLM 深度分析 ==========
        let mut analysis = match self.llm_service.analyze_profile(&profile).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("⚠️ LLM 分析不可用，退回关键词结果: {}", e);
                InvestorAnalysis {
                    is_investor: keyword_analysis.is_investor,
                    confidence: keyword_analysis.confidence,
                    reasoning: "keyword-based fallback (LLM unavailable)".to_string(),
                    ..Default::default()
                }
            }
        };

        // 引擎降级导致档案截断时应用保底置信度。
        // 这是从旧实现继承的策略开关（fallback_confidence），待重新评估。
        if !profile.extraction_complete
            && analysis.is_investor
            && analysis.confidence < self.fallback_confidence
        {
            warn!(
                "档案不完整，应用保底置信度 {:.2} (原 {:.2})",
                self.fallback_confidence, analysis.confidence
            );
            analysis.confidence = self.fallback_confidence;
        }

        // ========== 流程 3: 网络富集 + 综合评分 ==========
        let web_info = self.enrich(&profile, &analysis).await;

        let final_score = investor_scoring::score_investor(&analysis, &web_info);
        let qualified = final_score >= self.investor_threshold;
        info!(
            "📊 综合评分: {:.2} (阈值 {:.2}) → {}",
            final_score,
            self.investor_threshold,
            if qualified { "入选" } else { "不入选" }
        );

        // ========== 流程 4: 起草触达消息 ==========
        let draft_message = if qualified {
            match message_drafter::draft_message(
                &self.llm_service,
                &profile,
                &analysis,
                &web_info,
                &self.startup,
            )
            .await
            {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!("⚠️ 触达消息起草失败: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(InvestorReport {
            profile,
            keyword_analysis,
            analysis,
            web_info,
            final_score,
            qualified,
            draft_message,
        })
    }

    /// 网络搜索富集
    ///
    /// 没有配置搜索 API、或档案未判定为投资人时，
    /// 返回只带创业公司领域的空信号。
    async fn enrich(&self, profile: &ProfileSignals, analysis: &InvestorAnalysis) -> WebInfo {
        let empty = WebInfo {
            startup_sectors: self.startup.sectors.clone(),
            ..Default::default()
        };

        if !analysis.is_investor || !self.search_client.is_configured() {
            return empty;
        }
        let Some(name) = &profile.name else {
            return empty;
        };

        // 优先用基金名，退而求其次用当前公司
        let company_or_fund = if !analysis.fund_name.is_empty() {
            analysis.fund_name.clone()
        } else {
            profile.company.clone().unwrap_or_default()
        };

        let corpus = match self
            .search_client
            .investor_corpus(name, &company_or_fund)
            .await
        {
            Ok(corpus) if !corpus.is_empty() => corpus,
            Ok(_) => {
                info!("网络搜索没有返回可用语料");
                return empty;
            }
            Err(e) => {
                warn!("⚠️ 网络搜索失败: {}", e);
                return empty;
            }
        };

        match self
            .llm_service
            .extract_web_info(name, &company_or_fund, &corpus)
            .await
        {
            Ok(mut web_info) => {
                web_info.startup_sectors = self.startup.sectors.clone();
                info!(
                    "✓ 网络富集完成: {} 笔近期投资, {} 个投资阶段",
                    web_info.recent_investments.len(),
                    web_info.investment_stages.len()
                );
                web_info
            }
            Err(e) => {
                warn!("⚠️ 搜索语料抽取失败: {}", e);
                empty
            }
        }
    }
}
