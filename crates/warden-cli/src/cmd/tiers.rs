use std::path::Path;

use crate::output::{print_json, print_table, yes_no};

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let chain = cfg.tier_chain()?;

    if json {
        return print_json(&chain.tiers());
    }

    let rows = chain
        .tiers()
        .iter()
        .map(|t| {
            let path = chain
                .path_from(&t.name)
                .map(|p| p.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(" → "))
                .unwrap_or_default();
            vec![
                t.name.clone(),
                t.model.clone(),
                format!("{:.1}", t.required_gb),
                format!("{}s", t.keep_alive_secs),
                yes_no(t.ephemeral),
                path,
            ]
        })
        .collect();
    print_table(
        &["TIER", "MODEL", "REQUIRED_GB", "KEEP_ALIVE", "EPHEMERAL", "CHAIN"],
        rows,
    );
    Ok(())
}
