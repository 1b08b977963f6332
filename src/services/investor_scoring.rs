//! 投资人评分 - 业务能力层
//!
//! 两种相互独立的纯函数评分模式：
//! - 关键词/覆盖模式：直接作用于刚抓取的档案信号（初筛）
//! - 综合模式：档案已判定为投资人后，叠加网络富集出的二级信号
//!
//! 两者都是确定性的、无副作用的：相同输入必须产生逐位相同的输出。
//! 不持久化，每次请求重新计算。

use std::collections::HashSet;

use crate::models::profile::{
    InvestorAnalysis, KeywordAnalysis, ProfileSignals, ScoreBreakdown, WebInfo,
};

/// 投资人关键词（小写匹配）
pub const INVESTOR_KEYWORDS: &[&str] = &[
    "investor",
    "venture capital",
    "vc",
    "angel",
    "investment",
    "investing",
    "fund",
    "capital",
    "partner at",
    "seed",
    "early stage",
    "managing director",
    "general partner",
    "principal",
    "partner",
    "portfolio",
];

/// 强指示词（命中时置信度加成更高）
pub const STRONG_INDICATORS: &[&str] = &[
    "venture capital",
    "vc",
    "angel investor",
    "general partner",
    "seed investor",
];

/// 单个文本区块的命中统计
fn section_hits(text: &str) -> (Vec<&'static str>, usize) {
    let lower = text.to_lowercase();
    let hits: Vec<&'static str> = INVESTOR_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lower.contains(keyword))
        .collect();
    let strong = STRONG_INDICATORS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count();
    (hits, strong)
}

/// 关键词/覆盖模式评分
///
/// 扫描头衔、每条经历、关于三个区块。零命中时
/// `is_investor = false, confidence = 0`；否则：
///
/// ```text
/// base       = min(0.7, 命中数 * 0.1 + 覆盖区块数 * 0.2)
/// bonus      = min(0.3, 强指示词数 * 0.15)
/// confidence = min(0.95, base + bonus)
/// ```
pub fn analyze_keywords(signals: &ProfileSignals) -> KeywordAnalysis {
    let mut keyword_matches = 0usize;
    let mut strong_matches = 0usize;
    let mut sections_with_matches = 0usize;
    let mut roles: Vec<String> = Vec::new();
    let mut seen: HashSet<&'static str> = HashSet::new();

    let mut absorb = |hits: Vec<&'static str>, strong: usize| {
        if hits.is_empty() {
            return false;
        }
        keyword_matches += hits.len();
        strong_matches += strong;
        for hit in hits {
            if seen.insert(hit) {
                roles.push(hit.to_string());
            }
        }
        true
    };

    // 头衔
    if let Some(headline) = &signals.headline {
        let (hits, strong) = section_hits(headline);
        if absorb(hits, strong) {
            sections_with_matches += 1;
        }
    }

    // 经历：任意条目命中即算覆盖一个区块
    let mut experience_hit = false;
    for entry in &signals.experience {
        let (hits, strong) = section_hits(entry);
        if absorb(hits, strong) {
            experience_hit = true;
        }
    }
    if experience_hit {
        sections_with_matches += 1;
    }

    // 关于
    if let Some(about) = &signals.about {
        let (hits, strong) = section_hits(about);
        if absorb(hits, strong) {
            sections_with_matches += 1;
        }
    }

    if keyword_matches == 0 {
        return KeywordAnalysis::none();
    }

    let base = (keyword_matches as f64 * 0.1 + sections_with_matches as f64 * 0.2).min(0.7);
    let bonus = (strong_matches as f64 * 0.15).min(0.3);
    let confidence = (base + bonus).min(0.95);

    KeywordAnalysis {
        is_investor: true,
        confidence,
        keyword_matches,
        strong_matches,
        sections_with_matches,
        investor_keywords_found: roles,
        breakdown: ScoreBreakdown {
            confidence_component: base,
            keyword_bonus: bonus,
            final_score: confidence,
        },
    }
}

/// 综合模式评分
///
/// 置信度占 50%，其余来自网络富集信号：
/// - 近期投资数量：≥5 加 0.2，3–4 加 0.15，1–2 加 0.1
/// - 投资阶段含 "seed" 或 "early" 加 0.15
/// - 领域重合度按比例最多加 0.15
///
/// 结果截断到 [0,1]；未判定为投资人时恒为 0。
pub fn score_investor(analysis: &InvestorAnalysis, web_info: &WebInfo) -> f64 {
    if !analysis.is_investor {
        return 0.0;
    }

    let mut score = analysis.confidence * 0.5;

    let investments = web_info.recent_investments.len();
    score += if investments >= 5 {
        0.2
    } else if investments >= 3 {
        0.15
    } else if investments >= 1 {
        0.1
    } else {
        0.0
    };

    let stages = web_info.investment_stages.join(" ").to_lowercase();
    if stages.contains("seed") || stages.contains("early") {
        score += 0.15;
    }

    let investor_sectors: HashSet<&str> = web_info
        .investment_sectors
        .iter()
        .map(|s| s.as_str())
        .collect();
    let startup_sectors: HashSet<&str> = web_info
        .startup_sectors
        .iter()
        .map(|s| s.as_str())
        .collect();
    let overlap = investor_sectors.intersection(&startup_sectors).count();
    if overlap > 0 {
        let denominator = web_info.investment_sectors.len().max(1) as f64;
        score += (overlap as f64 / denominator).min(0.15);
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals_with_headline(headline: &str) -> ProfileSignals {
        ProfileSignals {
            url: "https://www.linkedin.com/in/example".to_string(),
            headline: Some(headline.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_matches_means_not_investor() {
        let signals = ProfileSignals {
            headline: Some("Software Engineer".to_string()),
            about: Some("I build distributed systems.".to_string()),
            experience: vec!["Backend developer".to_string()],
            ..Default::default()
        };
        let analysis = analyze_keywords(&signals);
        assert!(!analysis.is_investor);
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.investor_keywords_found.is_empty());
    }

    #[test]
    fn test_general_partner_headline() {
        let analysis = analyze_keywords(&signals_with_headline("General Partner at Acme Ventures"));
        assert!(analysis.is_investor);
        assert!(analysis.sections_with_matches >= 1);
        assert!(analysis.strong_matches >= 1);
        assert!(analysis.confidence > 0.5, "置信度 {} 应该大于 0.5", analysis.confidence);
    }

    #[test]
    fn test_keyword_analysis_is_deterministic() {
        let signals = ProfileSignals {
            headline: Some("Angel investor and seed fund partner".to_string()),
            about: Some("Early stage venture capital.".to_string()),
            experience: vec!["General Partner at Fund".to_string()],
            ..Default::default()
        };
        let a = analyze_keywords(&signals);
        let b = analyze_keywords(&signals);
        assert_eq!(a, b);
        assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    }

    #[test]
    fn test_confidence_is_capped() {
        // 三个区块都塞满关键词，置信度也不能超过 0.95
        let loaded = "venture capital vc angel investor general partner seed investor \
                      investing fund portfolio managing director principal";
        let signals = ProfileSignals {
            headline: Some(loaded.to_string()),
            about: Some(loaded.to_string()),
            experience: vec![loaded.to_string(), loaded.to_string()],
            ..Default::default()
        };
        let analysis = analyze_keywords(&signals);
        assert!(analysis.confidence <= 0.95);
        assert_eq!(analysis.breakdown.confidence_component, 0.7);
        assert_eq!(analysis.breakdown.keyword_bonus, 0.3);
    }

    #[test]
    fn test_breakdown_matches_confidence() {
        let analysis = analyze_keywords(&signals_with_headline("Partner at Early Stage Ventures"));
        let b = analysis.breakdown;
        assert_eq!(b.final_score, analysis.confidence);
        assert!((b.confidence_component + b.keyword_bonus - b.final_score).abs() < 1e-9);
    }

    fn investor(confidence: f64) -> InvestorAnalysis {
        InvestorAnalysis {
            is_investor: true,
            confidence,
            ..Default::default()
        }
    }

    fn web_info_with_investments(n: usize) -> WebInfo {
        WebInfo {
            recent_investments: (0..n).map(|i| format!("Startup {}", i)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_non_investor_scores_zero() {
        let analysis = InvestorAnalysis {
            is_investor: false,
            confidence: 0.9,
            ..Default::default()
        };
        assert_eq!(score_investor(&analysis, &web_info_with_investments(10)), 0.0);
    }

    #[test]
    fn test_score_monotonic_in_investments() {
        let analysis = investor(0.8);
        let mut previous = 0.0;
        for n in [0usize, 1, 2, 3, 4, 5, 8] {
            let score = score_investor(&analysis, &web_info_with_investments(n));
            assert!(
                score >= previous,
                "{} 笔投资的评分 {} 不应低于之前的 {}",
                n,
                score,
                previous
            );
            previous = score;
        }
    }

    #[test]
    fn test_score_clamped_at_one() {
        let analysis = investor(1.0);
        let web_info = WebInfo {
            recent_investments: (0..12).map(|i| format!("Startup {}", i)).collect(),
            investment_stages: vec!["Seed".to_string(), "Early stage".to_string()],
            investment_sectors: vec!["fintech".to_string()],
            startup_sectors: vec!["fintech".to_string()],
        };
        let score = score_investor(&analysis, &web_info);
        assert!(score <= 1.0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_seed_stage_bonus() {
        let analysis = investor(0.6);
        let base = score_investor(&analysis, &WebInfo::default());
        let with_stage = score_investor(
            &analysis,
            &WebInfo {
                investment_stages: vec!["Seed".to_string()],
                ..Default::default()
            },
        );
        assert!((with_stage - base - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_sector_overlap_bonus_is_proportional() {
        let analysis = investor(0.0);
        let web_info = WebInfo {
            investment_sectors: vec![
                "fintech".to_string(),
                "healthcare".to_string(),
                "devtools".to_string(),
                "climate".to_string(),
                "gaming".to_string(),
                "media".to_string(),
                "retail".to_string(),
                "space".to_string(),
                "biotech".to_string(),
                "security".to_string(),
            ],
            startup_sectors: vec!["fintech".to_string()],
            ..Default::default()
        };
        // 1/10 重合 → 0.1 加成，低于 0.15 上限
        let score = score_investor(&analysis, &web_info);
        assert!((score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_composite_is_deterministic() {
        let analysis = investor(0.77);
        let web_info = WebInfo {
            recent_investments: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            investment_stages: vec!["Series A".to_string()],
            investment_sectors: vec!["devtools".to_string()],
            startup_sectors: vec!["devtools".to_string()],
        };
        let a = score_investor(&analysis, &web_info);
        let b = score_investor(&analysis, &web_info);
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
