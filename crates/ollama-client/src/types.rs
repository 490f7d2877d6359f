use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

// ─── KeepAlive ────────────────────────────────────────────────────────────

/// How long Ollama keeps a model resident after the request finishes.
///
/// Serialized the way the runtime expects: `0` unloads immediately, other
/// values are duration strings such as `"5m"` or `"30s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive(pub Duration);

impl KeepAlive {
    pub const UNLOAD: KeepAlive = KeepAlive(Duration::ZERO);

    pub fn from_secs(secs: u64) -> Self {
        KeepAlive(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl std::fmt::Display for KeepAlive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.0.as_secs();
        if secs == 0 {
            f.write_str("0")
        } else if secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{secs}s")
        }
    }
}

impl Serialize for KeepAlive {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if self.0.is_zero() {
            s.serialize_u64(0)
        } else {
            s.serialize_str(&self.to_string())
        }
    }
}

// ─── /api/generate ────────────────────────────────────────────────────────

/// Body of `POST /api/generate`. Always non-streaming.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    pub keep_alive: KeepAlive,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, keep_alive: KeepAlive) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            stream: false,
            keep_alive,
        }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system.filter(|s| !s.is_empty());
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    /// Nanoseconds spent loading the model (absent when already resident).
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

// ─── /api/ps ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RunningModels {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

/// A model currently resident in the runtime's memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunningModel {
    pub name: String,
    #[serde(default)]
    pub model: String,
    /// Resident size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_zero_serializes_as_number() {
        let v = serde_json::to_value(KeepAlive::UNLOAD).unwrap();
        assert_eq!(v, serde_json::json!(0));
    }

    #[test]
    fn keep_alive_minutes_and_seconds() {
        assert_eq!(KeepAlive::from_secs(300).to_string(), "5m");
        assert_eq!(KeepAlive::from_secs(30).to_string(), "30s");
        assert_eq!(KeepAlive::from_secs(90).to_string(), "90s");
    }

    #[test]
    fn empty_system_prompt_is_dropped() {
        let req = GenerateRequest::new("gemma3:1b", "hi", KeepAlive::UNLOAD)
            .with_system(Some(String::new()));
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("system").is_none());
        assert_eq!(v["stream"], false);
    }

    #[test]
    fn running_models_tolerates_missing_fields() {
        let json = r#"{"models":[{"name":"gemma3:1b"}]}"#;
        let ps: RunningModels = serde_json::from_str(json).unwrap();
        assert_eq!(ps.models.len(), 1);
        assert_eq!(ps.models[0].size, 0);
    }
}
