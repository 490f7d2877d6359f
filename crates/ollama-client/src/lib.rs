//! `ollama-client`: async HTTP driver for a local Ollama inference runtime.
//!
//! Only the calls the model scheduler needs are covered: non-streaming
//! generation, explicit load and unload (both expressed through
//! `/api/generate` with an empty prompt), and listing resident models.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use ollama_client::{GenerateRequest, KeepAlive, OllamaClient};
//! use std::time::Duration;
//!
//! let client = OllamaClient::new("http://localhost:11434", Duration::from_secs(120))?;
//! let req = GenerateRequest::new("gemma3:1b", "Say hello", KeepAlive::from_secs(300));
//! let text = client.generate(&req).await?;
//! client.unload("gemma3:1b").await?;
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{OllamaClient, DEFAULT_BASE_URL};
pub use error::OllamaError;
pub use types::{GenerateRequest, GenerateResponse, KeepAlive, RunningModel};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, OllamaError>;
