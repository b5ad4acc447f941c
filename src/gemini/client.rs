use super::prompts::insight_prompt;
use crate::config::Config;
use crate::error::{AgentError, Result};
use crate::search::SearchResult;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const CONNECT_TIMEOUT: u64 = 10;
const REQUEST_TIMEOUT: u64 = 120;
const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 2048;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = HeaderValue::from_str(config.google_api_key.trim())
            .map_err(|_| AgentError::ConfigInvalid("GOOGLE_API_KEY contains invalid characters".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(concat!("marketing-insights/", env!("CARGO_PKG_VERSION"))));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .build()?;

        Ok(Self {
            client,
            base_url: config.gemini_api_url.clone(),
            model: config.gemini_model.clone(),
        })
    }

    /// Generates raw insight text for `query` grounded on `sources`.
    ///
    /// The text is returned verbatim; parsing happens in the extractor.
    pub async fn generate(&self, query: &str, sources: &[SearchResult]) -> Result<String> {
        let prompt = insight_prompt(query, sources);
        let start = Instant::now();
        let text = self.generate_content(&prompt).await?;
        info!(model = %self.model, chars = text.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Generation completed");
        let preview: String = text.chars().take(500).collect();
        debug!(%preview, "Raw generation output");
        Ok(text)
    }

    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let payload = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        });

        let resp = self.client.post(&url).json(&payload).send().await.map_err(map_err)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(AgentError::Api { status, message: body });
        }

        let body = resp.text().await.map_err(map_err)?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        response_text(parsed)
    }
}

fn response_text(resp: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AgentError::EmptyResponse(format!("prompt blocked ({reason})")));
    }

    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(AgentError::EmptyResponse("no candidates returned".into()));
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(AgentError::EmptyResponse("content blocked by safety filters".into()));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AgentError::EmptyResponse("candidate has no text parts".into()));
    }
    Ok(text)
}

fn map_err(e: reqwest::Error) -> AgentError {
    if e.is_timeout() { AgentError::Timeout(REQUEST_TIMEOUT) } else { AgentError::Http(e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

    async fn client_for(server: &MockServer) -> GeminiClient {
        let config = test_config("http://127.0.0.1:9/search", &format!("{}/v1beta", server.uri()));
        GeminiClient::new(&config).unwrap()
    }

    fn candidate_body(parts: &[&str]) -> serde_json::Value {
        let parts: Vec<_> = parts.iter().map(|t| json!({ "text": t })).collect();
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": parts },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn returns_candidate_text_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-google-key"))
            .and(body_partial_json(json!({
                "generationConfig": { "temperature": 0.7, "maxOutputTokens": 2048 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(&["```json\n{\"insights\": ", "[]}\n```"])))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).await.generate("q", &[]).await.unwrap();
        assert_eq!(text, "```json\n{\"insights\": []}\n```");
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.generate("q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Api { status: 429, ref message } if message == "quota exhausted"));
    }

    #[tokio::test]
    async fn missing_candidates_is_an_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.generate("q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn safety_block_is_an_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.generate("q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse(ref msg) if msg.contains("safety")));
    }

    #[tokio::test]
    async fn garbage_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.generate("q", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::JsonParse(_)));
    }
}
