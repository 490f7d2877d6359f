//! In-memory doubles for the runtime and RAM probe, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use ollama_client::OllamaError;

use crate::error::{Result, WardenError};
use crate::ram::RamProbe;
use crate::runtime::{InferenceCall, InferenceRuntime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load(String),
    Generate(String),
    Unload(String),
}

impl Event {
    pub fn model(&self) -> &str {
        match self {
            Event::Load(m) | Event::Generate(m) | Event::Unload(m) => m,
        }
    }
}

#[derive(Default)]
struct Recorded {
    events: Vec<Event>,
    prompts: Vec<String>,
    resident: HashSet<String>,
    max_resident: usize,
}

/// Runtime double that records every call and tracks what it holds loaded.
#[derive(Default)]
pub struct FakeRuntime {
    replies: HashMap<String, String>,
    failing: HashSet<String>,
    state: Mutex<Recorded>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, model: &str, text: &str) -> Self {
        self.replies.insert(model.into(), text.into());
        self
    }

    /// Every generate call on `model` fails with a transport error.
    pub fn fail(mut self, model: &str) -> Self {
        self.failing.insert(model.into());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn max_resident(&self) -> usize {
        self.state.lock().unwrap().max_resident
    }
}

impl InferenceRuntime for FakeRuntime {
    async fn load(&self, model: &str, _keep_alive: Duration) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.events.push(Event::Load(model.into()));
        s.resident.insert(model.into());
        s.max_resident = s.max_resident.max(s.resident.len());
        Ok(())
    }

    async fn generate(&self, call: &InferenceCall<'_>) -> Result<String> {
        let mut s = self.state.lock().unwrap();
        s.events.push(Event::Generate(call.model.into()));
        s.prompts.push(call.prompt.into());
        if self.failing.contains(call.model) {
            return Err(WardenError::Runtime(OllamaError::Connect(
                "connection refused".into(),
            )));
        }
        Ok(self
            .replies
            .get(call.model)
            .cloned()
            .unwrap_or_else(|| format!("output from {}", call.model)))
    }

    async fn unload(&self, model: &str) -> Result<()> {
        let mut s = self.state.lock().unwrap();
        s.events.push(Event::Unload(model.into()));
        s.resident.remove(model);
        Ok(())
    }
}

/// Probe that always reports the same free RAM.
pub struct FixedRam(pub f64);

impl RamProbe for FixedRam {
    fn available_gb(&self) -> f64 {
        self.0
    }
}
