use crate::error::{AgentError, Result};
use std::fmt::Display;
use std::str::FromStr;

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_SERPAPI_URL: &str = "https://serpapi.com/search";
const DEFAULT_CORS_ORIGINS: &str = "https://marketing-mba-frontend.onrender.com,http://localhost:3000";
const DEFAULT_HOST: &str = "0.0.0.0";

/// Hard ceiling on `max_results` accepted by `/analyze`, independent of
/// `MAX_RESULTS_LIMIT`.
pub const MAX_RESULTS_PER_REQUEST: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: String,
    pub serpapi_api_key: String,
    pub gemini_model: String,
    pub gemini_api_url: String,
    pub serpapi_url: String,
    pub environment: String,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub max_prompt_length: usize,
    pub max_results_limit: u32,
    pub request_timeout: u64,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        let google_api_key = env_key("GOOGLE_API_KEY")?;
        let serpapi_api_key = env_key("SERPAPI_API_KEY")?;

        let gemini_api_url = env_opt("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_GEMINI_API_URL.into());
        validate_url("GEMINI_API_URL", &gemini_api_url)?;
        let serpapi_url = env_opt("SERPAPI_URL").unwrap_or_else(|| DEFAULT_SERPAPI_URL.into());
        validate_url("SERPAPI_URL", &serpapi_url)?;

        let cors_origins = parse_origins(&env_opt("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into()));
        for origin in &cors_origins {
            validate_url("CORS_ORIGINS", origin)?;
        }

        Ok(Self {
            google_api_key,
            serpapi_api_key,
            gemini_model: env_opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            gemini_api_url: gemini_api_url.trim().trim_end_matches('/').to_string(),
            serpapi_url: serpapi_url.trim().to_string(),
            environment: env_opt("ENVIRONMENT").unwrap_or_else(|| "production".into()),
            log_level: env_opt("LOG_LEVEL").unwrap_or_else(|| "INFO".into()).to_uppercase(),
            cors_origins,
            max_prompt_length: env_range("MAX_PROMPT_LENGTH", 10_000, 1, 100_000)?,
            max_results_limit: env_range("MAX_RESULTS_LIMIT", 50, 1, 100)?,
            request_timeout: env_range("REQUEST_TIMEOUT", 60, 1, 600)?,
            host: env_opt("HOST").unwrap_or_else(|| DEFAULT_HOST.into()),
            port: env_range("PORT", 8000, 1, u16::MAX)?,
        })
    }

    /// Largest `max_results` a single request may ask for.
    pub fn max_results_cap(&self) -> u32 {
        MAX_RESULTS_PER_REQUEST.min(self.max_results_limit)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn mask_google_key(&self) -> String {
        mask_key(&self.google_api_key)
    }

    pub fn mask_serpapi_key(&self) -> String {
        mask_key(&self.serpapi_api_key)
    }
}

fn env_key(name: &str) -> Result<String> {
    let key = std::env::var(name)
        .map_err(|_| AgentError::ConfigMissing(format!("{name} not configured. Set it in the environment before starting the server.")))?
        .trim()
        .to_string();
    if key.is_empty() {
        return Err(AgentError::ConfigInvalid(format!("{name} cannot be empty")));
    }
    Ok(key)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn env_range<T>(name: &str, default: T, min: T, max: T) -> Result<T>
where
    T: FromStr + PartialOrd + Display + Copy,
{
    let Some(raw) = env_opt(name) else { return Ok(default) };
    let invalid = || AgentError::ConfigInvalid(format!("{name} must be an integer between {min} and {max}"));
    let val: T = raw.trim().parse().map_err(|_| invalid())?;
    if val < min || val > max {
        return Err(invalid());
    }
    Ok(val)
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    let url = url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AgentError::ConfigInvalid(format!("{name} must be a valid http or https URL")));
    }
    Ok(())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 8 {
        return "********".into();
    }
    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{first}********{last}")
}

#[cfg(test)]
pub fn test_config(serpapi_url: &str, gemini_api_url: &str) -> Config {
    Config {
        google_api_key: "test-google-key".into(),
        serpapi_api_key: "test-serpapi-key".into(),
        gemini_model: "test-model".into(),
        gemini_api_url: gemini_api_url.trim_end_matches('/').to_string(),
        serpapi_url: serpapi_url.to_string(),
        environment: "test".into(),
        log_level: "DEBUG".into(),
        cors_origins: vec!["http://localhost:3000".into()],
        max_prompt_length: 10_000,
        max_results_limit: 50,
        request_timeout: 60,
        host: "127.0.0.1".into(),
        port: 0,
    }
}
