use crate::agent::MarketingAgent;
use crate::config::Config;
use crate::error::AgentError;
use crate::schemas::{AnalyzeRequest, AnalyzeResponse, HealthResponse};

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agent: Arc<MarketingAgent>,
}

impl AppState {
    pub fn new(config: Config, agent: MarketingAgent) -> Self {
        Self { config: Arc::new(config), agent: Arc::new(agent) }
    }
}

/// Error surfaced by the HTTP layer; everything below it degrades instead.
#[derive(Debug)]
pub struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self.0 {
            AgentError::InvalidParam(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AgentError::Timeout(secs) => (StatusCode::GATEWAY_TIMEOUT, format!("Request timeout after {secs}s")),
            other => (StatusCode::INTERNAL_SERVER_ERROR, format!("Analysis failed: {other}")),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Marketing Analysis API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        environment: state.config.environment.clone(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    req.validate(state.config.max_prompt_length, state.config.max_results_cap())
        .map_err(AgentError::InvalidParam)?;

    let preview: String = req.prompt.chars().take(50).collect();
    info!(prompt = %preview, max_results = req.max_results, "Analyzing");

    let agent = state.agent.clone();
    let result = run_bounded(state.config.request_timeout, async move {
        agent.run(&req.prompt, req.max_results).await
    })
    .await?;
    Ok(Json(result))
}

/// Runs the analysis on its own task. A panic becomes a 500 and an overrun
/// aborts the task and becomes a 504.
async fn run_bounded<F>(timeout: u64, analysis: F) -> Result<AnalyzeResponse, ApiError>
where
    F: Future<Output = AnalyzeResponse> + Send + 'static,
{
    let mut task = tokio::spawn(analysis);

    match tokio::time::timeout(Duration::from_secs(timeout), &mut task).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => {
            error!(error = %e, "Analysis task failed");
            Err(AgentError::Pipeline(e.to_string()).into())
        }
        Err(_) => {
            task.abort();
            error!(timeout_secs = timeout, "Request timeout");
            Err(AgentError::Timeout(timeout).into())
        }
    }
}
