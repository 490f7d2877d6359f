//! Model tiers and their fallback chain.
//!
//! Tiers are plain data: each names its fallback, and the chain is walked by
//! name lookups. [`TierChain::new`] rejects any table whose fallback links
//! could loop or end somewhere other than the cheapest tier of the chain.

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ModelTier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub name: String,
    /// Model identifier understood by the inference runtime.
    pub model: String,
    /// Free RAM (GB) that must be available before loading.
    pub required_gb: f64,
    /// Idle time before the runtime passively evicts the model.
    pub keep_alive_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// Evict right after each generation instead of waiting out keep-alive.
    #[serde(default = "default_ephemeral")]
    pub ephemeral: bool,
}

fn default_ephemeral() -> bool {
    true
}

impl ModelTier {
    pub fn new(name: impl Into<String>, model: impl Into<String>, required_gb: f64) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            required_gb,
            keep_alive_secs: 30,
            fallback: None,
            ephemeral: true,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn with_keep_alive(mut self, secs: u64) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn always_warm(mut self) -> Self {
        self.ephemeral = false;
        self
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Tier table shipped in the default config.
pub fn default_tiers() -> Vec<ModelTier> {
    vec![
        ModelTier::new("router", "gemma3:1b", 0.5)
            .with_keep_alive(300)
            .always_warm(),
        ModelTier::new("analysis", "phi4-mini", 2.5).with_fallback("router"),
        ModelTier::new("content", "gemma3:4b", 3.0).with_fallback("content-large"),
        ModelTier::new("content-large", "gemma2:9b", 6.0).with_fallback("router"),
    ]
}

// ---------------------------------------------------------------------------
// TierChain
// ---------------------------------------------------------------------------

/// Validated, immutable set of tiers.
#[derive(Debug, Clone)]
pub struct TierChain {
    tiers: Vec<ModelTier>,
    index: HashMap<String, usize>,
}

impl TierChain {
    pub fn new(tiers: Vec<ModelTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(WardenError::InvalidTierChain("no tiers configured".into()));
        }

        let mut index = HashMap::new();
        for (i, tier) in tiers.iter().enumerate() {
            if tier.name.trim().is_empty() {
                return Err(WardenError::InvalidTierChain(format!(
                    "tier #{i} has an empty name"
                )));
            }
            if tier.required_gb.is_nan() || tier.required_gb < 0.0 {
                return Err(WardenError::InvalidTierChain(format!(
                    "tier '{}' has invalid required_gb {}",
                    tier.name, tier.required_gb
                )));
            }
            if index.insert(tier.name.clone(), i).is_some() {
                return Err(WardenError::InvalidTierChain(format!(
                    "duplicate tier name '{}'",
                    tier.name
                )));
            }
        }

        let chain = Self { tiers, index };
        for tier in &chain.tiers {
            chain.check_chain_from(tier)?;
        }
        Ok(chain)
    }

    /// Walk the chain starting at `start` and enforce the two structural rules.
    fn check_chain_from(&self, start: &ModelTier) -> Result<()> {
        let mut seen = HashSet::new();
        let mut current = start;
        let mut min_gb = current.required_gb;
        seen.insert(current.name.as_str());

        while let Some(next_name) = &current.fallback {
            let next = self.get(next_name).ok_or_else(|| {
                WardenError::InvalidTierChain(format!(
                    "tier '{}' falls back to unknown tier '{next_name}'",
                    current.name
                ))
            })?;
            if !seen.insert(next.name.as_str()) {
                return Err(WardenError::InvalidTierChain(format!(
                    "fallback cycle through '{}'",
                    next.name
                )));
            }
            min_gb = min_gb.min(next.required_gb);
            current = next;
        }

        if current.required_gb > min_gb {
            return Err(WardenError::InvalidTierChain(format!(
                "chain from '{}' ends at '{}' ({:.1}GB) which is not its smallest tier ({min_gb:.1}GB)",
                start.name, current.name, current.required_gb
            )));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelTier> {
        self.index.get(name).map(|&i| &self.tiers[i])
    }

    pub fn require(&self, name: &str) -> Result<&ModelTier> {
        self.get(name)
            .ok_or_else(|| WardenError::UnknownTier(name.to_string()))
    }

    pub fn fallback_of(&self, tier: &ModelTier) -> Option<&ModelTier> {
        tier.fallback.as_deref().and_then(|n| self.get(n))
    }

    /// Tiers tried for a request to `name`, in order.
    pub fn path_from(&self, name: &str) -> Result<Vec<&ModelTier>> {
        let mut out = vec![self.require(name)?];
        while let Some(next) = out.last().and_then(|t| self.fallback_of(t)) {
            out.push(next);
        }
        Ok(out)
    }

    pub fn tiers(&self) -> &[ModelTier] {
        &self.tiers
    }
}
