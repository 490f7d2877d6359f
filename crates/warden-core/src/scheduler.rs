//! Resource-aware model scheduler.
//!
//! Keeps at most one tier resident in the inference runtime. A request for a
//! tier evicts whatever other tier is loaded, checks free RAM against the
//! tier's headroom *before* loading, and walks the fallback chain when a tier
//! cannot fit or fails twice.
//!
//! ```text
//! run(tier)
//!   └─ for tier in chain(tier):
//!        expire idle residency ─▶ evict other tier ─▶ probe RAM
//!          ├─ free < required ─────────────▶ next tier (no load, no retry)
//!          └─ load ─▶ generate (≤ 2 attempts) ─▶ evict if ephemeral
//!               ├─ long enough ────────────▶ return Normal
//!               └─ short / error ──────────▶ next tier
//!   └─ chain exhausted: best short output as Low, else error
//! ```

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Result, WardenError};
use crate::ram::RamProbe;
use crate::residency::{Residency, ResidencyTracker};
use crate::runtime::{InferenceCall, InferenceRuntime};
use crate::tier::{ModelTier, TierChain};

/// Attempts per tier before falling back.
const ATTEMPTS_PER_TIER: u32 = 2;

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub tier: String,
    pub prompt: String,
    /// Output shorter than this many characters counts as a failed attempt.
    pub min_length: usize,
    pub system: Option<String>,
}

impl GenerationRequest {
    pub fn new(tier: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            prompt: prompt.into(),
            min_length: 0,
            system: None,
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Normal,
    /// Output is below the requested minimum length; callers decide whether
    /// to accept it.
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    /// Tier that produced `text` (may differ from the requested tier).
    pub tier: String,
    pub model: String,
    pub confidence: Confidence,
    /// Generation calls issued across the whole chain.
    pub attempts: u32,
}

impl Generation {
    pub fn is_low_confidence(&self) -> bool {
        self.confidence == Confidence::Low
    }
}

enum TierOutcome {
    Success(String),
    Short(String),
    Failed(WardenError),
    NoHeadroom { free_gb: f64 },
}

// ---------------------------------------------------------------------------
// ModelScheduler
// ---------------------------------------------------------------------------

pub struct ModelScheduler<R, P> {
    runtime: R,
    probe: P,
    tiers: TierChain,
    residency: Mutex<ResidencyTracker>,
    unload_settle: Duration,
}

impl<R: InferenceRuntime, P: RamProbe> ModelScheduler<R, P> {
    pub fn new(runtime: R, probe: P, tiers: TierChain) -> Self {
        Self {
            runtime,
            probe,
            tiers,
            residency: Mutex::new(ResidencyTracker::new()),
            unload_settle: Duration::ZERO,
        }
    }

    /// Pause after an explicit eviction so the OS can reclaim memory before
    /// the next RAM probe.
    pub fn with_unload_settle(mut self, settle: Duration) -> Self {
        self.unload_settle = settle;
        self
    }

    pub fn tiers(&self) -> &TierChain {
        &self.tiers
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Snapshot of the residency state.
    pub async fn residency(&self) -> Option<Residency> {
        self.residency.lock().await.current().cloned()
    }

    /// Generate text on `req.tier`, falling back along the chain as needed.
    pub async fn run(&self, req: &GenerationRequest) -> Result<Generation> {
        let path = self.tiers.path_from(&req.tier)?;
        let mut residency = self.residency.lock().await;

        let mut attempts = 0;
        let mut best_short: Option<(String, &ModelTier)> = None;
        let mut last_error: Option<WardenError> = None;
        let mut last_free_gb = f64::NAN;

        for (i, &tier) in path.iter().enumerate() {
            let outcome = self
                .attempt_tier(&mut residency, tier, req, &mut attempts)
                .await;
            match outcome {
                TierOutcome::Success(text) => {
                    tracing::info!(tier = %tier.name, model = %tier.model, attempts, "generation complete");
                    return Ok(Generation {
                        text,
                        tier: tier.name.clone(),
                        model: tier.model.clone(),
                        confidence: Confidence::Normal,
                        attempts,
                    });
                }
                TierOutcome::Short(text) => {
                    if best_short
                        .as_ref()
                        .is_none_or(|(t, _)| text.chars().count() > t.chars().count())
                    {
                        best_short = Some((text, tier));
                    }
                }
                TierOutcome::Failed(err) => last_error = Some(err),
                TierOutcome::NoHeadroom { free_gb } => last_free_gb = free_gb,
            }
            if let Some(next) = path.get(i + 1) {
                tracing::info!(from = %tier.name, to = %next.name, "falling back to next tier");
            }
        }

        if let Some((text, tier)) = best_short {
            tracing::warn!(
                tier = %tier.name,
                len = text.chars().count(),
                min_length = req.min_length,
                "returning low-confidence output"
            );
            return Ok(Generation {
                text,
                tier: tier.name.clone(),
                model: tier.model.clone(),
                confidence: Confidence::Low,
                attempts,
            });
        }

        match last_error {
            Some(err) => Err(WardenError::Exhausted {
                requested: req.tier.clone(),
                last_error: err.to_string(),
            }),
            None => Err(WardenError::ResourceExhausted {
                requested: req.tier.clone(),
                free_gb: last_free_gb,
            }),
        }
    }

    /// Evict whatever is resident.
    pub async fn unload_all(&self) {
        let mut residency = self.residency.lock().await;
        self.evict(&mut residency).await;
    }

    async fn attempt_tier(
        &self,
        residency: &mut ResidencyTracker,
        tier: &ModelTier,
        req: &GenerationRequest,
        attempts: &mut u32,
    ) -> TierOutcome {
        if let Some(idle) = residency.expire(Utc::now()) {
            tracing::debug!(tier = %idle.tier, "resident tier passed keep-alive; unloading");
            self.release(&idle).await;
        }

        if !residency.is_resident(&tier.name) {
            self.evict(residency).await;
            let free_gb = self.probe.available_gb();
            if free_gb < tier.required_gb {
                tracing::warn!(
                    tier = %tier.name,
                    free_gb,
                    required_gb = tier.required_gb,
                    "insufficient free RAM; skipping tier"
                );
                return TierOutcome::NoHeadroom { free_gb };
            }
            tracing::debug!(tier = %tier.name, free_gb, "headroom ok");
        }

        let mut short: Option<String> = None;
        let mut last_error = None;
        for attempt in 0..ATTEMPTS_PER_TIER {
            *attempts += 1;
            let prompt = if attempt > 0 && short.is_some() {
                length_nudge(&req.prompt, req.min_length)
            } else {
                req.prompt.clone()
            };
            match self
                .generate_once(residency, tier, &prompt, req.system.as_deref())
                .await
            {
                Ok(text) if text.chars().count() >= req.min_length => {
                    return TierOutcome::Success(text)
                }
                Ok(text) => {
                    tracing::warn!(
                        tier = %tier.name,
                        attempt,
                        len = text.chars().count(),
                        min_length = req.min_length,
                        "output too short"
                    );
                    if short
                        .as_ref()
                        .is_none_or(|s| text.chars().count() > s.chars().count())
                    {
                        short = Some(text);
                    }
                }
                Err(err) => {
                    tracing::warn!(tier = %tier.name, attempt, error = %err, "generation failed");
                    last_error = Some(err);
                }
            }
        }

        match (short, last_error) {
            (Some(text), _) => TierOutcome::Short(text),
            (None, Some(err)) => TierOutcome::Failed(err),
            (None, None) => TierOutcome::Failed(WardenError::Exhausted {
                requested: tier.name.clone(),
                last_error: "no attempts made".into(),
            }),
        }
    }

    async fn generate_once(
        &self,
        residency: &mut ResidencyTracker,
        tier: &ModelTier,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String> {
        if !residency.is_resident(&tier.name) {
            tracing::info!(tier = %tier.name, model = %tier.model, "loading tier");
            self.runtime.load(&tier.model, tier.keep_alive()).await?;
            residency.mark_loaded(tier, Utc::now());
        }

        let call = InferenceCall {
            model: &tier.model,
            prompt,
            system,
            keep_alive: tier.keep_alive(),
        };
        let result = self.runtime.generate(&call).await;

        if tier.ephemeral {
            self.evict(residency).await;
        } else {
            residency.touch(Utc::now(), tier);
        }
        result
    }

    async fn evict(&self, residency: &mut ResidencyTracker) {
        let Some(resident) = residency.clear() else {
            return;
        };
        tracing::info!(tier = %resident.tier, model = %resident.model, "evicting tier");
        self.release(&resident).await;
    }

    /// Explicit unload signal for a tier no longer tracked as resident.
    /// The runtime may already have dropped it; failures are only logged.
    async fn release(&self, resident: &Residency) {
        if let Err(err) = self.runtime.unload(&resident.model).await {
            tracing::warn!(model = %resident.model, error = %err, "unload failed; continuing");
        }
        if !self.unload_settle.is_zero() {
            tokio::time::sleep(self.unload_settle).await;
        }
    }
}

fn length_nudge(prompt: &str, min_length: usize) -> String {
    format!("{prompt}\n\nIMPORTANT: Write a complete, detailed response of at least {min_length} characters.")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakeRuntime, FixedRam};
    use crate::tier::{default_tiers, ModelTier};

    fn two_tier_chain() -> TierChain {
        TierChain::new(vec![
            ModelTier::new("a", "model-a", 4.0).with_fallback("b"),
            ModelTier::new("b", "model-b", 1.0),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn falls_back_when_headroom_is_insufficient() {
        let runtime = FakeRuntime::new().reply("model-b", "fallback answer");
        let sched = ModelScheduler::new(runtime, FixedRam(2.0), two_tier_chain());

        let out = sched.run(&GenerationRequest::new("a", "hi")).await.unwrap();
        assert_eq!(out.tier, "b");
        assert_eq!(out.text, "fallback answer");

        let events = sched.runtime().events();
        assert!(
            !events.iter().any(|e| e.model() == "model-a"),
            "tier a must never be touched: {events:?}"
        );
    }

    #[tokio::test]
    async fn ephemeral_tier_is_evicted_right_after_generation() {
        let runtime = FakeRuntime::new().reply("model-a", "done");
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), two_tier_chain());

        sched.run(&GenerationRequest::new("a", "hi")).await.unwrap();
        assert_eq!(
            sched.runtime().events(),
            vec![
                Event::Load("model-a".into()),
                Event::Generate("model-a".into()),
                Event::Unload("model-a".into()),
            ]
        );
        assert!(sched.residency().await.is_none());
    }

    #[tokio::test]
    async fn warm_tier_is_reused_without_reload() {
        let runtime = FakeRuntime::new().reply("gemma3:1b", "routed");
        let tiers = TierChain::new(default_tiers()).unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), tiers);

        sched.run(&GenerationRequest::new("router", "one")).await.unwrap();
        sched.run(&GenerationRequest::new("router", "two")).await.unwrap();

        let loads = sched
            .runtime()
            .events()
            .iter()
            .filter(|e| matches!(e, Event::Load(_)))
            .count();
        assert_eq!(loads, 1);
        assert_eq!(sched.residency().await.unwrap().tier, "router");
    }

    #[tokio::test]
    async fn different_tier_evicts_resident_before_loading() {
        let runtime = FakeRuntime::new()
            .reply("gemma3:1b", "routed")
            .reply("gemma3:4b", "content content content");
        let tiers = TierChain::new(default_tiers()).unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), tiers);

        sched.run(&GenerationRequest::new("router", "go")).await.unwrap();
        sched.run(&GenerationRequest::new("content", "write")).await.unwrap();

        let events = sched.runtime().events();
        let unload_router = events
            .iter()
            .position(|e| *e == Event::Unload("gemma3:1b".into()))
            .unwrap();
        let load_content = events
            .iter()
            .position(|e| *e == Event::Load("gemma3:4b".into()))
            .unwrap();
        assert!(unload_router < load_content, "{events:?}");
    }

    #[tokio::test]
    async fn never_two_tiers_resident_across_mixed_workloads() {
        let runtime = FakeRuntime::new()
            .reply("gemma3:1b", "r")
            .reply("phi4-mini", "analysis")
            .fail("gemma3:4b")
            .reply("gemma2:9b", "long content from the large tier");
        let tiers = TierChain::new(default_tiers()).unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(16.0), tiers);

        for tier in ["router", "content", "analysis", "router", "content", "router"] {
            let _ = sched
                .run(&GenerationRequest::new(tier, "prompt").with_min_length(5))
                .await;
        }
        assert_eq!(sched.runtime().max_resident(), 1);
    }

    #[tokio::test]
    async fn idle_warm_tier_is_unloaded_before_next_load() {
        let runtime = FakeRuntime::new()
            .reply("m-router", "r")
            .reply("m-big", "big answer");
        let tiers = TierChain::new(vec![
            ModelTier::new("big", "m-big", 2.0).with_fallback("router"),
            ModelTier::new("router", "m-router", 0.5)
                .with_keep_alive(0)
                .always_warm(),
        ])
        .unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), tiers);

        sched.run(&GenerationRequest::new("router", "go")).await.unwrap();
        sched.run(&GenerationRequest::new("big", "write")).await.unwrap();

        let events = sched.runtime().events();
        assert_eq!(
            events,
            vec![
                Event::Load("m-router".into()),
                Event::Generate("m-router".into()),
                Event::Unload("m-router".into()),
                Event::Load("m-big".into()),
                Event::Generate("m-big".into()),
                Event::Unload("m-big".into()),
            ]
        );
        assert_eq!(sched.runtime().max_resident(), 1);
    }

    #[tokio::test]
    async fn transport_failure_retries_once_then_falls_back() {
        let runtime = FakeRuntime::new().fail("model-a").reply("model-b", "ok");
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), two_tier_chain());

        let out = sched.run(&GenerationRequest::new("a", "hi")).await.unwrap();
        assert_eq!(out.tier, "b");
        let a_generates = sched
            .runtime()
            .events()
            .iter()
            .filter(|e| **e == Event::Generate("model-a".into()))
            .count();
        assert_eq!(a_generates, 2);
        assert_eq!(out.attempts, 3);
    }

    #[tokio::test]
    async fn short_output_everywhere_is_returned_as_low_confidence() {
        let runtime = FakeRuntime::new()
            .reply("model-a", "tiny")
            .reply("model-b", "short!");
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), two_tier_chain());

        let out = sched
            .run(&GenerationRequest::new("a", "hi").with_min_length(100))
            .await
            .unwrap();
        assert!(out.is_low_confidence());
        assert_eq!(out.text, "short!");
        assert_eq!(out.attempts, 4);
    }

    #[tokio::test]
    async fn short_retry_nudges_the_prompt() {
        let runtime = FakeRuntime::new().reply("model-b", "meh");
        let tiers = TierChain::new(vec![ModelTier::new("b", "model-b", 1.0)]).unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), tiers);

        sched
            .run(&GenerationRequest::new("b", "write a post").with_min_length(50))
            .await
            .unwrap();
        let prompts = sched.runtime().prompts();
        assert_eq!(prompts[0], "write a post");
        assert!(prompts[1].contains("at least 50 characters"));
    }

    #[tokio::test]
    async fn no_tier_fits_is_resource_exhausted() {
        let sched = ModelScheduler::new(FakeRuntime::new(), FixedRam(0.2), two_tier_chain());
        let err = sched.run(&GenerationRequest::new("a", "hi")).await.unwrap_err();
        assert!(matches!(err, WardenError::ResourceExhausted { .. }), "{err}");
        assert!(sched.runtime().events().is_empty());
    }

    #[tokio::test]
    async fn all_tiers_failing_is_exhausted() {
        let runtime = FakeRuntime::new().fail("model-a").fail("model-b");
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), two_tier_chain());
        let err = sched.run(&GenerationRequest::new("a", "hi")).await.unwrap_err();
        assert!(matches!(err, WardenError::Exhausted { .. }), "{err}");
    }

    #[tokio::test]
    async fn unknown_tier_is_rejected_before_any_call() {
        let sched = ModelScheduler::new(FakeRuntime::new(), FixedRam(8.0), two_tier_chain());
        let err = sched.run(&GenerationRequest::new("zzz", "hi")).await.unwrap_err();
        assert!(matches!(err, WardenError::UnknownTier(_)));
        assert!(sched.runtime().events().is_empty());
    }

    #[tokio::test]
    async fn unload_all_clears_warm_tier() {
        let runtime = FakeRuntime::new().reply("gemma3:1b", "x");
        let tiers = TierChain::new(default_tiers()).unwrap();
        let sched = ModelScheduler::new(runtime, FixedRam(8.0), tiers);
        sched.run(&GenerationRequest::new("router", "go")).await.unwrap();
        sched.unload_all().await;
        assert!(sched.residency().await.is_none());
        assert_eq!(
            sched.runtime().events().last(),
            Some(&Event::Unload("gemma3:1b".into()))
        );
    }
}
