//! 档案字段选择器表
//!
//! 每个逻辑字段对应一张按优先级排列的声明式选择器表：
//! 站点布局漂移时只改这里的数据，不改抽取代码。
//! 选择器来自对 LinkedIn 多代页面布局的观察，新布局放在前面。
//!
//! 表版本：v1（2025-08）

use phf::phf_map;

pub const NAME_SELECTORS: &[&str] = &[
    "h1.text-heading-xlarge",
    "h1.inline.t-24",
    "h1.top-card-layout__title",
    "h1.pv-top-card-section__name",
];

pub const HEADLINE_SELECTORS: &[&str] = &[
    "div.text-body-medium",
    "h2.top-card-layout__headline",
    "div.pv-top-card-section__headline",
    "div.text-body-large",
];

pub const ABOUT_SELECTORS: &[&str] = &[
    "div.display-flex.ph5.pv3 > div.inline-show-more-text",
    "div.pv-about__summary-text",
    "section.summary div.pv-shared-text-with-see-more",
    "section.pv-about-section div.inline-show-more-text",
];

pub const EXPERIENCE_SELECTORS: &[&str] = &[
    "section#experience-section li",
    "section.experience-section li",
    "section.pv-profile-section.experience-section ul.pv-profile-section__section-info li",
    "div#experience ul li.artdeco-list__item",
    "main section:nth-child(5) ul li",
];

/// 逻辑字段名 → 选择器表
pub static PROFILE_SELECTORS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "name" => NAME_SELECTORS,
    "headline" => HEADLINE_SELECTORS,
    "about" => ABOUT_SELECTORS,
    "experience" => EXPERIENCE_SELECTORS,
};

/// 取某个逻辑字段的选择器表（未知字段返回空表）
pub fn field_selectors(field: &str) -> &'static [&'static str] {
    PROFILE_SELECTORS.get(field).copied().unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_profile_fields_present() {
        for field in ["name", "headline", "about", "experience"] {
            assert!(
                !field_selectors(field).is_empty(),
                "字段 {} 缺少选择器表",
                field
            );
        }
    }

    #[test]
    fn test_unknown_field_is_empty() {
        assert!(field_selectors("nonexistent").is_empty());
    }

    #[test]
    fn test_priority_order_puts_current_layout_first() {
        assert_eq!(NAME_SELECTORS[0], "h1.text-heading-xlarge");
        assert_eq!(HEADLINE_SELECTORS[0], "div.text-body-medium");
    }
}
