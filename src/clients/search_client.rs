//! 网络搜索客户端
//!
//! 调用 Tavily 风格的搜索 REST API，为投资人富集二级信号。
//! 未配置 API key 时整个富集环节安静跳过。

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, SearchError};

/// 单条搜索结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchSnippet>,
}

/// 搜索客户端
pub struct SearchClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SearchClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.search_api_key.clone(),
            base_url: config.search_api_base_url.clone(),
        }
    }

    /// 是否配置了可用的 API key
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// 执行一次搜索
    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchSnippet>> {
        let endpoint = format!("{}/search", self.base_url);
        debug!("搜索: {}", query);

        let response = self
            .http
            .post(&endpoint)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "advanced",
            }))
            .send()
            .await
            .map_err(|e| {
                AppError::Search(SearchError::RequestFailed {
                    endpoint: endpoint.clone(),
                    source: Box::new(e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Search(SearchError::BadResponse {
                endpoint,
                status: status.as_u16(),
            }));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            AppError::Search(SearchError::RequestFailed {
                endpoint,
                source: Box::new(e),
            })
        })?;

        Ok(body.results)
    }

    /// 汇总投资人相关的搜索语料
    ///
    /// 三条固定查询：近期投资、投资组合、投资人画像。
    /// 单条查询失败不终止整体流程，只记警告。
    pub async fn investor_corpus(&self, name: &str, company_or_fund: &str) -> AppResult<String> {
        let queries = [
            format!("{} {} recent investments", name, company_or_fund),
            format!("{} portfolio companies", company_or_fund),
            format!("{} investor profile angel vc", name),
        ];

        let mut corpus = String::new();
        for query in &queries {
            match self.search(query).await {
                Ok(snippets) => {
                    for snippet in snippets {
                        if !snippet.content.is_empty() {
                            corpus.push_str(&snippet.content);
                            corpus.push('\n');
                        }
                    }
                }
                Err(e) => warn!("搜索查询失败 ({}): {}", query, e),
            }
        }

        Ok(corpus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_client() {
        let client = SearchClient::new(&Config::default());
        assert!(!client.is_configured());
    }

    #[test]
    fn test_response_parsing_tolerates_extra_fields() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"query": "x", "results": [{"title": "t", "content": "c", "url": "u", "score": 0.9}]}"#,
        )
        .unwrap();
        assert_eq!(body.results.len(), 1);
        assert_eq!(body.results[0].content, "c");
    }
}
