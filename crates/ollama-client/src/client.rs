use std::time::Duration;

use crate::types::{GenerateRequest, GenerateResponse, KeepAlive, RunningModel, RunningModels};
use crate::{OllamaError, Result};

/// Default runtime address, matching Ollama's own default.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Unload calls carry no generation work, so they get a shorter budget.
const UNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

// ─── OllamaClient ─────────────────────────────────────────────────────────

/// Thin async client over the Ollama HTTP API.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(OllamaError::InvalidBaseUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(OllamaError::Http)?;
        Ok(Self {
            http,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a non-streaming generation and return the trimmed response text.
    pub async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        tracing::debug!(model = %req.model, keep_alive = %req.keep_alive, "ollama generate");
        let resp: GenerateResponse = self
            .post_json("/api/generate", req, self.request_timeout)
            .await?;
        Ok(resp.response.trim().to_string())
    }

    /// Load `model` into memory without generating anything.
    ///
    /// Ollama treats an empty prompt as a load request; `keep_alive` sets how
    /// long it stays resident once idle.
    pub async fn load(&self, model: &str, keep_alive: KeepAlive) -> Result<()> {
        tracing::debug!(model, keep_alive = %keep_alive, "ollama load");
        let req = GenerateRequest::new(model, "", keep_alive);
        let _: GenerateResponse = self
            .post_json("/api/generate", &req, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Ask the runtime to drop `model` from memory immediately.
    pub async fn unload(&self, model: &str) -> Result<()> {
        tracing::debug!(model, "ollama unload");
        let req = GenerateRequest::new(model, "", KeepAlive::UNLOAD);
        let _: GenerateResponse = self.post_json("/api/generate", &req, UNLOAD_TIMEOUT).await?;
        Ok(())
    }

    /// Models the runtime currently holds in memory.
    pub async fn running(&self) -> Result<Vec<RunningModel>> {
        let url = format!("{}/api/ps", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(UNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.classify(e, UNLOAD_TIMEOUT))?;
        let ps: RunningModels = Self::decode(resp).await?;
        Ok(ps.models)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &GenerateRequest,
        timeout: Duration,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OllamaError::Status {
                code: status.as_u16(),
                body,
            });
        }
        resp.json::<T>().await.map_err(OllamaError::Decode)
    }

    fn classify(&self, err: reqwest::Error, timeout: Duration) -> OllamaError {
        if err.is_timeout() {
            OllamaError::Timeout(timeout.as_secs())
        } else if err.is_connect() {
            OllamaError::Connect(self.base_url.clone())
        } else {
            OllamaError::Http(err)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
