use std::path::Path;
use warden_core::ram::{RamProbe, SystemRamProbe};

use crate::output::{print_json, print_table, yes_no};

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let free_gb = SystemRamProbe::new().available_gb();

    if json {
        let tiers: Vec<_> = cfg
            .tiers
            .iter()
            .map(|t| {
                serde_json::json!({
                    "tier": t.name,
                    "required_gb": t.required_gb,
                    "fits": free_gb >= t.required_gb,
                })
            })
            .collect();
        return print_json(&serde_json::json!({ "free_gb": free_gb, "tiers": tiers }));
    }

    println!("Free RAM: {free_gb:.2} GB\n");
    let rows = cfg
        .tiers
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                format!("{:.1}", t.required_gb),
                yes_no(free_gb >= t.required_gb),
            ]
        })
        .collect();
    print_table(&["TIER", "REQUIRED_GB", "FITS"], rows);
    Ok(())
}
