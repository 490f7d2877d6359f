use thiserror::Error;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("unknown model tier: {0}")]
    UnknownTier(String),

    #[error("invalid tier chain: {0}")]
    InvalidTierChain(String),

    /// Every tier in the fallback chain was skipped for lack of free RAM.
    #[error("no tier in the chain starting at '{requested}' fits in free memory ({free_gb:.1}GB free)")]
    ResourceExhausted { requested: String, free_gb: f64 },

    /// The chain ran out after at least one tier failed to generate.
    #[error("all tiers exhausted starting at '{requested}': {last_error}")]
    Exhausted {
        requested: String,
        last_error: String,
    },

    #[error("inference runtime error: {0}")]
    Runtime(#[from] ollama_client::OllamaError),

    #[error("unknown action id: {0}")]
    UnknownActionId(String),

    #[error("action id already pending: {0}")]
    DuplicateActionId(String),

    #[error("unknown action type '{0}': must be click, type, scroll, extract, submit, or other")]
    UnknownActionType(String),

    #[error("invalid decision '{0}': must be allow, allow_all, skip, stop, or edit")]
    InvalidDecision(String),

    #[error("invalid edit payload: {0}")]
    InvalidEditPayload(String),

    #[error("invalid confidence {0}: must be within 0.0..=1.0")]
    InvalidConfidence(f64),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("config already exists at {0}")]
    ConfigExists(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WardenError>;
