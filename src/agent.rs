use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::extract::extract;
use crate::gemini::GeminiClient;
use crate::schemas::{
    AnalyzeResponse, CATEGORY_MAX_CHARS, DETAIL_MAX_CHARS, Insight, SNIPPET_MAX_CHARS, Source, TITLE_MAX_CHARS,
    truncate_chars,
};
use crate::search::{SearchClient, SearchResult};
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info, warn};

const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_DETAIL: &str = "No detail provided";
const DEFAULT_CATEGORY: &str = "General";

/// Runs search, generation and extraction for one query.
#[derive(Debug, Clone)]
pub struct MarketingAgent {
    search: SearchClient,
    gemini: GeminiClient,
}

impl MarketingAgent {
    pub fn new(config: &Config) -> Result<Self> {
        let agent = Self {
            search: SearchClient::new(config)?,
            gemini: GeminiClient::new(config)?,
        };
        info!(model = %config.gemini_model, "Marketing agent initialized");
        Ok(agent)
    }

    /// Never fails: a pipeline error collapses into [`AnalyzeResponse::empty`].
    pub async fn run(&self, query: &str, max_results: u32) -> AnalyzeResponse {
        let start = Instant::now();
        match self.analyze(query, max_results as usize, start).await {
            Ok(result) => {
                info!(
                    insights = result.total_insights,
                    sources = result.sources.len(),
                    processing_time = result.processing_time,
                    "Analysis complete"
                );
                result
            }
            Err(e) => {
                error!(error = %e, "Analysis pipeline failed, returning empty result");
                AnalyzeResponse::empty()
            }
        }
    }

    async fn analyze(&self, query: &str, max_results: usize, start: Instant) -> Result<AnalyzeResponse> {
        let found = self.search.search(query, max_results).await;

        let raw = match self.gemini.generate(query, &found).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Generation unavailable, continuing without insights");
                None
            }
        };

        let extraction = extract(raw.as_deref(), query);
        if extraction.is_degraded() {
            warn!(branch = extraction.branch(), "Insights come from a degraded generation result");
        }
        let record = extraction.into_record();
        let insights = build_insights(raw_insights(&record)?, max_results);
        let sources = build_sources(&found, max_results);

        Ok(AnalyzeResponse::new(insights, sources, round_secs(start.elapsed().as_secs_f64())))
    }
}

/// Insight items of a parsed record. Shapes that carry no items degrade to an
/// empty list; only an `insights` value that is neither a list nor text fails
/// the pipeline.
fn raw_insights(record: &Value) -> Result<&[Value]> {
    let Some(fields) = record.as_object() else {
        warn!(kind = kind(record), "Generated record is not a JSON object, no insights");
        return Ok(&[]);
    };
    match fields.get("insights") {
        None => {
            warn!("Generated record has no 'insights' key");
            Ok(&[])
        }
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(Value::String(_)) => {
            warn!("Generated 'insights' is text, not a list");
            Ok(&[])
        }
        Some(other) => Err(AgentError::Pipeline(format!("'insights' must be an array, got {}", kind(other)))),
    }
}

pub fn build_insights(raw: &[Value], max_results: usize) -> Vec<Insight> {
    if raw.is_empty() {
        warn!("No insights received from generation");
    }
    raw.iter()
        .take(max_results)
        .enumerate()
        .filter_map(|(idx, data)| match build_insight(idx, data) {
            Ok(insight) => Some(insight),
            Err(e) => {
                warn!(index = idx, error = %e, "Skipping invalid insight");
                None
            }
        })
        .collect()
}

/// Validates one raw insight, filling defaults and enforcing field limits.
pub fn build_insight(idx: usize, data: &Value) -> Result<Insight> {
    let Some(fields) = data.as_object() else {
        return Err(AgentError::InvalidParam(format!("insight must be an object, got {}", kind(data))));
    };

    let title = stringify(fields.get("title")).unwrap_or_else(|| format!("Insight {}", idx + 1));
    let detail = stringify(fields.get("detail")).unwrap_or_else(|| DEFAULT_DETAIL.into());
    let category = stringify(fields.get("category")).unwrap_or_else(|| DEFAULT_CATEGORY.into());

    Ok(Insight {
        title: truncate_chars(&title, TITLE_MAX_CHARS),
        detail: truncate_chars(&detail, DETAIL_MAX_CHARS),
        confidence: coerce_confidence(fields.get("confidence")),
        category: truncate_chars(&category, CATEGORY_MAX_CHARS),
    })
}

pub fn build_sources(found: &[SearchResult], max_results: usize) -> Vec<Source> {
    found
        .iter()
        .take(max_results)
        .map(|r| Source {
            title: r.title.clone(),
            url: r.url.clone(),
            snippet: truncate_chars(&r.snippet, SNIPPET_MAX_CHARS),
        })
        .collect()
}

fn stringify(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn coerce_confidence(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    match parsed {
        Some(c) if !c.is_nan() => c.clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
