//! Seam between the scheduler and the inference runtime.

use std::future::Future;
use std::time::Duration;

use ollama_client::{GenerateRequest, KeepAlive, OllamaClient};

use crate::error::Result;

/// One generation call as the scheduler issues it.
#[derive(Debug, Clone)]
pub struct InferenceCall<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    /// Passive idle timeout hint for the runtime.
    pub keep_alive: Duration,
}

/// The operations the scheduler needs from an inference runtime.
///
/// Any error returned is treated as a transport failure of the current tier.
pub trait InferenceRuntime: Send + Sync {
    fn load(&self, model: &str, keep_alive: Duration) -> impl Future<Output = Result<()>> + Send;

    fn generate(&self, call: &InferenceCall<'_>) -> impl Future<Output = Result<String>> + Send;

    fn unload(&self, model: &str) -> impl Future<Output = Result<()>> + Send;
}

impl InferenceRuntime for OllamaClient {
    async fn load(&self, model: &str, keep_alive: Duration) -> Result<()> {
        OllamaClient::load(self, model, KeepAlive(keep_alive)).await?;
        Ok(())
    }

    async fn generate(&self, call: &InferenceCall<'_>) -> Result<String> {
        let req = GenerateRequest::new(call.model, call.prompt, KeepAlive(call.keep_alive))
            .with_system(call.system.map(str::to_string));
        Ok(OllamaClient::generate(self, &req).await?)
    }

    async fn unload(&self, model: &str) -> Result<()> {
        OllamaClient::unload(self, model).await?;
        Ok(())
    }
}
