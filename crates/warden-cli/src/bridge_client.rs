//! Blocking HTTP client for a running permission bridge.

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde_json::Value;

pub struct BridgeClient {
    base: String,
    agent: ureq::Agent,
}

impl BridgeClient {
    pub fn new(base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn pending(&self) -> anyhow::Result<Value> {
        self.get("/permission/pending")
    }

    pub fn result(&self, id: &str) -> anyhow::Result<Value> {
        self.get(&format!("/permission/result/{id}"))
    }

    pub fn decide(&self, id: &str, decision: &str, payload: Option<Value>) -> anyhow::Result<Value> {
        let mut body = serde_json::json!({ "id": id, "decision": decision });
        if let Some(p) = payload {
            body["edit_payload"] = p;
        }
        self.post("/permission/result", body)
    }

    pub fn request(&self, body: Value) -> anyhow::Result<Value> {
        self.post("/permission/request", body)
    }

    /// Withdraw `id`, returning any decision that landed first.
    pub fn finish(&self, id: &str) -> anyhow::Result<Value> {
        self.post("/permission/finish", serde_json::json!({ "id": id }))
    }

    pub fn set_allow_all(&self, minutes: u64) -> anyhow::Result<Value> {
        self.post(
            "/permission/set_allow_all",
            serde_json::json!({ "duration_minutes": minutes }),
        )
    }

    pub fn allow_all_status(&self) -> anyhow::Result<Value> {
        self.get("/permission/allow_all_status")
    }

    pub fn set_skip(&self, action_type: &str, skip: bool) -> anyhow::Result<Value> {
        self.post(
            "/permission/skip_types",
            serde_json::json!({ "action_type": action_type, "skip": skip }),
        )
    }

    fn get(&self, path: &str) -> anyhow::Result<Value> {
        let url = format!("{}{path}", self.base);
        read(self.agent.get(&url).call(), &url)
    }

    fn post(&self, path: &str, body: Value) -> anyhow::Result<Value> {
        let url = format!("{}{path}", self.base);
        read(self.agent.post(&url).send_json(body), &url)
    }
}

fn read(result: Result<ureq::Response, ureq::Error>, url: &str) -> anyhow::Result<Value> {
    match result {
        Ok(resp) => resp
            .into_json::<Value>()
            .with_context(|| format!("invalid JSON from {url}")),
        Err(ureq::Error::Status(code, resp)) => {
            let message = resp
                .into_json::<Value>()
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or_else(|| "no error message".to_string());
            Err(anyhow!("bridge returned {code}: {message}"))
        }
        Err(e) => Err(anyhow!(e)).with_context(|| format!("cannot reach bridge at {url}")),
    }
}
