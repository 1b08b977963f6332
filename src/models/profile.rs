//! 投资人档案相关的数据模型
//!
//! `ProfileSignals` 是浏览器抽取的原始信号；`KeywordAnalysis` 与
//! `InvestorAnalysis` 分别来自关键词初筛与 LLM 深度分析；
//! `WebInfo` 是网络搜索富集出的二级信号。

use serde::{Deserialize, Serialize};

/// 从档案页面抽取出的原始信号
///
/// 字段允许缺失：页面布局漂移时部分选择器可能全部落空。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSignals {
    /// 档案 URL（已归一化）
    pub url: String,
    /// 姓名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// 头衔/标题行
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// 关于（自我介绍）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    /// 经历条目（最多取前 5 条）
    #[serde(default)]
    pub experience: Vec<String>,
    /// 当前公司（可能由经历推断，允许为空）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// 基金名称（通常由 LLM 分析补全）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fund: Option<String>,
    /// 抽取是否完整（引擎中途降级时为 false，仅内部使用）
    #[serde(skip)]
    pub extraction_complete: bool,
}

/// 关键词评分的分项结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    /// 基础分（关键词命中数 + 覆盖的区块数）
    pub confidence_component: f64,
    /// 强指示词加成
    pub keyword_bonus: f64,
    /// 最终置信度
    pub final_score: f64,
}

/// 关键词初筛结果（纯函数输出，不持久化，每次请求重新计算）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordAnalysis {
    pub is_investor: bool,
    pub confidence: f64,
    /// 三个区块（头衔/经历/关于）中的关键词总命中数
    pub keyword_matches: usize,
    /// 强指示词命中数
    pub strong_matches: usize,
    /// 含有至少一个命中的区块数（0..=3）
    pub sections_with_matches: usize,
    /// 命中的关键词（按出现顺序去重）
    pub investor_keywords_found: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

impl KeywordAnalysis {
    /// 零命中结果
    pub fn none() -> Self {
        Self {
            is_investor: false,
            confidence: 0.0,
            keyword_matches: 0,
            strong_matches: 0,
            sections_with_matches: 0,
            investor_keywords_found: Vec::new(),
            breakdown: ScoreBreakdown::default(),
        }
    }
}

/// LLM 深度分析结果
///
/// 所有字段带默认值：LLM 返回不完整 JSON 时也能解析出可用结构。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestorAnalysis {
    #[serde(default)]
    pub is_investor: bool,
    #[serde(default)]
    pub investor_type: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub fund_name: String,
    #[serde(default)]
    pub investment_focus: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

/// 网络搜索富集出的二级信号
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebInfo {
    /// 近期投资（公司名列表）
    #[serde(default)]
    pub recent_investments: Vec<String>,
    /// 投资阶段（如 "Seed", "Series A"）
    #[serde(default)]
    pub investment_stages: Vec<String>,
    /// 投资领域
    #[serde(default)]
    pub investment_sectors: Vec<String>,
    /// 创业公司所属领域（来自电梯演讲）
    #[serde(default)]
    pub startup_sectors: Vec<String>,
}

/// 完整的投资人分析报告（/analyze_investor 的响应体）
#[derive(Debug, Clone, Serialize)]
pub struct InvestorReport {
    pub profile: ProfileSignals,
    pub keyword_analysis: KeywordAnalysis,
    pub analysis: InvestorAnalysis,
    pub web_info: WebInfo,
    /// 综合评分（[0,1]）
    pub final_score: f64,
    /// 是否达到入选阈值
    pub qualified: bool,
    /// 达标时起草的触达消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_message: Option<String>,
}
