pub mod approve;
pub mod generate;
pub mod init;
pub mod ram;
pub mod request;
pub mod run;
pub mod serve;
pub mod tiers;

use anyhow::{bail, Context};
use ollama_client::OllamaClient;
use std::path::Path;
use warden_core::config::{Config, WarnLevel};
use warden_core::paths;
use warden_core::ram::SystemRamProbe;
use warden_core::scheduler::ModelScheduler;

use crate::bridge_client::BridgeClient;

pub type Scheduler = ModelScheduler<OllamaClient, SystemRamProbe>;

/// Load and validate the project config. Error-level findings abort;
/// warnings are logged.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let cfg = Config::load(root)
        .with_context(|| format!("failed to load {}", paths::config_path(root).display()))?;
    let mut errors = Vec::new();
    for w in cfg.validate() {
        match w.level {
            WarnLevel::Error => errors.push(w.message),
            WarnLevel::Warning => tracing::warn!("{}", w.message),
        }
    }
    if !errors.is_empty() {
        bail!("invalid {}: {}", paths::CONFIG_FILE, errors.join("; "));
    }
    Ok(cfg)
}

pub fn build_scheduler(cfg: &Config) -> anyhow::Result<Scheduler> {
    let client = OllamaClient::new(cfg.ollama.base_url.clone(), cfg.ollama.request_timeout())?;
    let tiers = cfg.tier_chain()?;
    Ok(ModelScheduler::new(client, SystemRamProbe::new(), tiers)
        .with_unload_settle(cfg.scheduler.unload_settle()))
}

/// Client for the bridge at `explicit`, or the configured bridge address.
pub fn bridge_client(root: &Path, explicit: Option<&str>) -> anyhow::Result<BridgeClient> {
    match explicit {
        Some(url) => Ok(BridgeClient::new(url)),
        None => Ok(BridgeClient::new(&Config::load(root)?.bridge.url())),
    }
}
