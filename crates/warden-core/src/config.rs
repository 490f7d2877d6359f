use crate::error::{Result, WardenError};
use crate::paths;
use crate::tier::{default_tiers, ModelTier, TierChain};
use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `ollama.base_url`.
pub const OLLAMA_BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl BridgeConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr())
    }
}

// ---------------------------------------------------------------------------
// OllamaConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    ollama_client::DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_gate_timeout")]
    pub timeout_secs: u64,
    /// Length of the override window opened by an `allow_all` decision.
    #[serde(default = "default_allow_all_minutes")]
    pub allow_all_minutes: u64,
    /// Abandoned requests are dropped after this long.
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_types: Vec<ActionType>,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_gate_timeout() -> u64 {
    300
}

fn default_allow_all_minutes() -> u64 {
    30
}

fn default_retention() -> u64 {
    900
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            timeout_secs: default_gate_timeout(),
            allow_all_minutes: default_allow_all_minutes(),
            retention_secs: default_retention(),
            skip_types: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// The always-warm tier.
    #[serde(default = "default_router_tier")]
    pub router_tier: String,
    #[serde(default = "default_unload_settle")]
    pub unload_settle_ms: u64,
}

fn default_router_tier() -> String {
    "router".to_string()
}

fn default_unload_settle() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            router_tier: default_router_tier(),
            unload_settle_ms: default_unload_settle(),
        }
    }
}

impl SchedulerConfig {
    pub fn unload_settle(&self) -> Duration {
        Duration::from_millis(self.unload_settle_ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<ModelTier>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            ollama: OllamaConfig::default(),
            gate: GateConfig::default(),
            scheduler: SchedulerConfig::default(),
            tiers: default_tiers(),
        }
    }
}

impl Config {
    pub fn exists(root: &Path) -> bool {
        paths::config_path(root).exists()
    }

    /// Load `warden.yaml` from `root`, or defaults if there is none.
    /// Environment overrides are applied either way.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let mut cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&data)?
            }
        } else {
            Config::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Write the default config, refusing to clobber an existing file unless
    /// `force` is set.
    pub fn init(root: &Path, force: bool) -> Result<Self> {
        let path = paths::config_path(root);
        if path.exists() && !force {
            return Err(WardenError::ConfigExists(path.display().to_string()));
        }
        let cfg = Config::default();
        cfg.save(root)?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(OLLAMA_BASE_URL_ENV).filter(|s| !s.trim().is_empty()) {
            self.ollama.base_url = url;
        }
    }

    pub fn tier_chain(&self) -> Result<TierChain> {
        TierChain::new(self.tiers.clone())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match self.tier_chain() {
            Err(e) => warnings.push(ConfigWarning::error(e.to_string())),
            Ok(chain) => match chain.get(&self.scheduler.router_tier) {
                None => warnings.push(ConfigWarning::error(format!(
                    "scheduler.router_tier '{}' is not a configured tier",
                    self.scheduler.router_tier
                ))),
                Some(router) if router.ephemeral => {
                    warnings.push(ConfigWarning::warning(format!(
                        "router tier '{}' is ephemeral; it will be reloaded on every call",
                        router.name
                    )))
                }
                Some(_) => {}
            },
        }

        for tier in self.tiers.iter().filter(|t| t.keep_alive_secs == 0) {
            warnings.push(ConfigWarning::warning(format!(
                "tier '{}' has keep_alive_secs=0; the runtime will unload it before it can be used",
                tier.name
            )));
        }

        if !self.ollama.base_url.starts_with("http://")
            && !self.ollama.base_url.starts_with("https://")
        {
            warnings.push(ConfigWarning::error(format!(
                "ollama.base_url '{}' must start with http:// or https://",
                self.ollama.base_url
            )));
        }

        if self.gate.poll_interval_ms == 0 {
            warnings.push(ConfigWarning::error(
                "gate.poll_interval_ms must be greater than 0",
            ));
        }
        if self.gate.timeout_secs == 0 {
            warnings.push(ConfigWarning::warning(
                "gate.timeout_secs=0: every escalated action will stop immediately",
            ));
        }
        if self.gate.retention_secs <= self.gate.timeout_secs {
            warnings.push(ConfigWarning::warning(format!(
                "gate.retention_secs ({}) should exceed gate.timeout_secs ({}); pending requests may be swept while still awaited",
                self.gate.retention_secs, self.gate.timeout_secs
            )));
        }
        if self.gate.allow_all_minutes == 0 {
            warnings.push(ConfigWarning::warning(
                "gate.allow_all_minutes=0: allow_all decisions will not open an override window",
            ));
        }

        if !is_loopback(&self.bridge.host) {
            warnings.push(ConfigWarning::warning(format!(
                "bridge.host '{}' is not loopback; the bridge has no authentication",
                self.bridge.host
            )));
        }

        warnings
    }
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_validate_cleanly() {
        let cfg = Config::default();
        assert!(cfg.validate().is_empty(), "{:?}", cfg.validate());
        assert_eq!(cfg.bridge.addr(), "127.0.0.1:8000");
        assert_eq!(cfg.gate.timeout_secs, 300);
        assert_eq!(cfg.tiers.len(), 4);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r#"
gate:
  timeout_secs: 60
  skip_types: [scroll, extract]
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.gate.timeout_secs, 60);
        assert_eq!(cfg.gate.poll_interval_ms, 1000);
        assert_eq!(
            cfg.gate.skip_types,
            vec![ActionType::Scroll, ActionType::Extract]
        );
        assert_eq!(cfg.bridge.port, 8000);
        assert_eq!(cfg.scheduler.router_tier, "router");
    }

    #[test]
    fn tiers_parse_from_yaml() {
        let yaml = r#"
scheduler:
  router_tier: tiny
tiers:
  - name: tiny
    model: gemma3:1b
    required_gb: 0.5
    keep_alive_secs: 300
    ephemeral: false
  - name: big
    model: gemma2:9b
    required_gb: 6.0
    keep_alive_secs: 30
    fallback: tiny
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        let chain = cfg.tier_chain().unwrap();
        assert!(chain.get("big").unwrap().ephemeral);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn missing_file_loads_defaults_and_save_roundtrips() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::load(dir.path()).unwrap();
        cfg.bridge.port = 9100;
        cfg.save(dir.path()).unwrap();
        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.bridge.port, 9100);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        Config::init(dir.path(), false).unwrap();
        assert!(matches!(
            Config::init(dir.path(), false),
            Err(WardenError::ConfigExists(_))
        ));
        assert!(Config::init(dir.path(), true).is_ok());
    }

    #[test]
    fn env_overrides_base_url() {
        let mut cfg = Config::default();
        cfg.apply_env(|k| (k == OLLAMA_BASE_URL_ENV).then(|| "http://gpu-box:11434".into()));
        assert_eq!(cfg.ollama.base_url, "http://gpu-box:11434");
    }

    #[test]
    fn validate_flags_unknown_router_tier() {
        let mut cfg = Config::default();
        cfg.scheduler.router_tier = "ghost".into();
        let w = cfg.validate();
        assert!(w
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("ghost")));
    }

    #[test]
    fn validate_flags_short_retention() {
        let mut cfg = Config::default();
        cfg.gate.retention_secs = 100;
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.message.contains("retention_secs")));
    }

    #[test]
    fn validate_flags_broken_chain() {
        let mut cfg = Config::default();
        cfg.tiers[1].fallback = Some("nowhere".into());
        assert!(cfg
            .validate()
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("nowhere")));
    }
}
