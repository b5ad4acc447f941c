use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 200;
pub const DETAIL_MAX_CHARS: usize = 5000;
pub const CATEGORY_MAX_CHARS: usize = 50;
pub const SNIPPET_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Marketing query to analyze
    pub prompt: String,

    /// Maximum number of insights and sources (1-20, default 5)
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 { 5 }

impl AnalyzeRequest {
    pub fn validate(&self, max_prompt_length: usize, max_results_cap: u32) -> Result<(), String> {
        if self.prompt.is_empty() {
            return Err("prompt cannot be empty".into());
        }
        if self.prompt.chars().count() > max_prompt_length {
            return Err(format!("prompt exceeds {max_prompt_length} characters"));
        }
        if self.max_results < 1 || self.max_results > max_results_cap {
            return Err(format!("max_results must be between 1 and {max_results_cap}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub detail: String,
    pub confidence: f64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub insights: Vec<Insight>,
    pub sources: Vec<Source>,
    pub total_insights: usize,
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
}

impl AnalyzeResponse {
    pub fn new(insights: Vec<Insight>, sources: Vec<Source>, processing_time: f64) -> Self {
        Self {
            total_insights: insights.len(),
            insights,
            sources,
            processing_time,
            timestamp: Utc::now(),
        }
    }

    /// Result returned when the pipeline fails as a whole.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new(), 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
}

/// Truncates to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
