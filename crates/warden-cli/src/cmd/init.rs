use std::path::Path;
use warden_core::config::Config;
use warden_core::paths;

use crate::output::print_json;

pub fn run(root: &Path, force: bool, json: bool) -> anyhow::Result<()> {
    let cfg = Config::init(root, force)?;
    let path = paths::config_path(root);
    if json {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "tiers": cfg.tiers.len(),
        }))?;
    } else {
        println!("Wrote {}", path.display());
        println!(
            "  bridge  {}\n  ollama  {}\n  tiers   {}",
            cfg.bridge.url(),
            cfg.ollama.base_url,
            cfg.tiers
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
