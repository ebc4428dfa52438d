use std::env;
use std::time::Duration;

/// Maximum allowed per-call timeout. 600s matches the upstream gateway's
/// request ceiling and prevents Instant overflow from untrusted input.
pub const MAX_TIMEOUT_SECS: u64 = 600;

/// Default per-call timeout when neither env nor mode config specifies one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Process-wide configuration for the model gateway and run defaults.
pub struct Config {
    /// OpenAI-compatible chat-completions endpoint.
    pub base_url: String,
    /// Upstream credential. None means the gateway will fail every call.
    pub api_key: Option<String>,
    /// Models used when a request's mode_config names none.
    pub default_models: Vec<String>,
    /// Low-cost model for the post-run title call.
    pub title_model: String,
    /// Per-call timeout applied to every gateway request.
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let api_key = env::var("CONCLAVE_API_KEY").ok();
        if api_key.is_none() {
            tracing::warn!("CONCLAVE_API_KEY not set — all gateway calls will fail");
        }

        let base_url = env::var("CONCLAVE_BASE_URL")
            .unwrap_or_else(|_| "https://openrouter.ai/api/v1/chat/completions".to_string());

        let default_models = env::var("CONCLAVE_DEFAULT_MODELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if default_models.is_empty() {
            tracing::warn!("CONCLAVE_DEFAULT_MODELS not set — requests must name models");
        }

        let title_model = env::var("CONCLAVE_TITLE_MODEL")
            .ok()
            .or_else(|| default_models.first().cloned())
            .unwrap_or_else(|| "openai/gpt-4o-mini".to_string());

        let timeout_secs = env::var("CONCLAVE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, MAX_TIMEOUT_SECS);

        Config {
            base_url,
            api_key,
            default_models,
            title_model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}
