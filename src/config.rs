use std::{env, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStyle {
    /// Azure OpenAI deployments authenticate with an `api-key` header.
    Azure,
    /// OpenAI-compatible endpoints authenticate with a bearer token.
    OpenAi,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_backoff_ms: 400,
            max_backoff_ms: 4_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub api_style: ApiStyle,
    pub model: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl LlmConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    fn from_env() -> Self {
        let retry = RetryPolicy {
            max_attempts: env_parse("LLM_MAX_ATTEMPTS")
                .unwrap_or(RetryPolicy::default().max_attempts)
                .max(1),
            initial_backoff_ms: env_parse("LLM_RETRY_BACKOFF_MS")
                .unwrap_or(RetryPolicy::default().initial_backoff_ms),
            ..RetryPolicy::default()
        };
        Self {
            endpoint: env_string("LLM_ENDPOINT").unwrap_or_default(),
            api_key: env_string("LLM_API_KEY").unwrap_or_default(),
            api_style: match env_string("LLM_API_STYLE").as_deref() {
                Some(style) if style.eq_ignore_ascii_case("openai") => ApiStyle::OpenAi,
                _ => ApiStyle::Azure,
            },
            model: env_string("LLM_MODEL"),
            timeout: Duration::from_secs(env_parse("LLM_TIMEOUT_SECS").unwrap_or(20)),
            retry,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            api_style: ApiStyle::Azure,
            model: None,
            timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub sales_team_email: String,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            port: env_parse("PORT").unwrap_or(4000),
            sales_team_email: env_string("SALES_TEAM_EMAIL")
                .unwrap_or_else(|| "sales@example.com".to_string()),
            llm: LlmConfig::from_env(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|value| value.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_endpoint_or_key_is_not_configured() {
        let mut config = LlmConfig {
            endpoint: "https://example.openai.azure.com/chat".to_string(),
            api_key: "  ".to_string(),
            ..LlmConfig::default()
        };
        assert!(!config.is_configured());
        config.api_key = "secret".to_string();
        assert!(config.is_configured());
        config.endpoint = String::new();
        assert!(!config.is_configured());
    }
}
