use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use warden_core::hub::PermissionHub;
use warden_server::AppState;

pub fn run(root: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut cfg = super::load_config(root)?;
    if let Some(h) = host {
        cfg.bridge.host = h;
    }
    if let Some(p) = port {
        cfg.bridge.port = p;
    }

    let hub = Arc::new(PermissionHub::from_config(&cfg.gate));
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let state = AppState::new(hub, Duration::from_millis(cfg.gate.poll_interval_ms));
        let addr = cfg.bridge.addr();
        tokio::select! {
            res = warden_server::serve(&addr, state) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down bridge");
                Ok(())
            }
        }
    })
}
