use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("cannot connect to Ollama at {0}: is it running?")]
    Connect(String),

    #[error("Ollama request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("failed to decode Ollama response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}
