//! `warden-core`: model residency scheduling and human approval for a local
//! automation agent.
//!
//! Two independent subsystems, sequenced by the [`driver::AgentDriver`]:
//!
//! ```text
//! AgentDriver
//!   ├─ generate step ─▶ ModelScheduler ─▶ InferenceRuntime (Ollama)
//!   │                     │  RamProbe, ResidencyTracker, TierChain
//!   │                     └─ evict ▶ probe ▶ load ▶ generate ▶ fallback
//!   └─ action step ───▶ ActionGate ─▶ PermissionHub ◀─ Remote Bridge (HTTP)
//!                                        │  SkipSet, OverrideWindow
//!                                        └─ CorrelationStore
//! ```
//!
//! The scheduler owns residency state outright. The hub is the only shared
//! state; the gate and the bridge each hold an `Arc` to it.

pub mod config;
pub mod correlation;
pub mod driver;
pub mod error;
pub mod gate;
pub mod hub;
pub mod io;
pub mod paths;
pub mod policy;
pub mod ram;
pub mod residency;
pub mod runtime;
pub mod scheduler;
pub mod tier;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, WardenError};
