use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConclaveError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("mode {mode} requires between {min} and {max} models, got {got}")]
    ModelCount {
        mode: String,
        min: usize,
        max: usize,
        got: usize,
    },

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("cancelled after {0}ms")]
    Cancelled(u64),

    #[error("rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("upstream error from {provider}: {message}")]
    Upstream {
        provider: String,
        message: String,
        status: Option<u16>,
    },

    #[error("auth failed for {provider}: {message}")]
    AuthFailed { provider: String, message: String },

    #[error("phase {phase} failed: {reason}")]
    PhaseFailed { phase: String, reason: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl ConclaveError {
    /// Produce a sanitized message safe for the terminal `error` event.
    /// Does not leak endpoint URLs, credentials, or upstream error bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownMode(mode) => format!("unknown mode: {mode}"),
            Self::ModelCount {
                mode,
                min,
                max,
                got,
            } => format!("mode {mode} requires between {min} and {max} models, got {got}"),
            Self::Timeout(ms) => format!("request timed out after {ms}ms"),
            Self::Cancelled(_) => "run was cancelled".to_string(),
            Self::RateLimited { provider } => {
                format!("rate limited by {provider} — try again shortly")
            }
            Self::Upstream { provider, .. } => format!("upstream error from {provider}"),
            Self::AuthFailed { provider, .. } => format!("authentication failed for {provider}"),
            Self::PhaseFailed { phase, reason } => format!("{phase} failed: {reason}"),
            Self::Request(_) => "request to model gateway failed".to_string(),
            Self::Other(msg) => msg.clone(),
        }
    }
}
