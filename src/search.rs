use crate::config::Config;
use crate::error::{AgentError, Result};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const CONNECT_TIMEOUT: u64 = 10;
const SEARCH_TIMEOUT: u64 = 30;

/// One organic web result, normalized from the provider's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerpApiOrganic {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl From<SerpApiOrganic> for SearchResult {
    fn from(raw: SerpApiOrganic) -> Self {
        Self {
            title: raw.title.unwrap_or_default(),
            url: raw.link.unwrap_or_default(),
            snippet: raw.snippet.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(concat!("marketing-insights/", env!("CARGO_PKG_VERSION"))));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .timeout(Duration::from_secs(SEARCH_TIMEOUT))
            .build()?;

        Ok(Self {
            client,
            url: config.serpapi_url.clone(),
            api_key: config.serpapi_api_key.clone(),
        })
    }

    /// Returns up to `limit` results. Provider failures degrade to an empty list.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        match self.try_search(query, limit).await {
            Ok(results) => {
                info!(sources = results.len(), "Web search completed");
                results
            }
            Err(e) => {
                warn!(error = %e, "Web search unavailable, continuing without sources");
                Vec::new()
            }
        }
    }

    async fn try_search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let num = limit.to_string();
        let resp = self
            .client
            .get(&self.url)
            .query(&[("q", query), ("api_key", self.api_key.as_str()), ("num", num.as_str()), ("engine", "google")])
            .send()
            .await
            .map_err(map_err)?;

        if resp.status() != StatusCode::OK {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, message: body });
        }

        let body = resp.text().await.map_err(map_err)?;
        let parsed: SerpApiResponse = serde_json::from_str(&body)?;
        Ok(parsed.organic_results.into_iter().take(limit).map(SearchResult::from).collect())
    }
}

fn map_err(e: reqwest::Error) -> AgentError {
    if e.is_timeout() { AgentError::Timeout(SEARCH_TIMEOUT) } else { AgentError::Http(e.without_url()) }
}
