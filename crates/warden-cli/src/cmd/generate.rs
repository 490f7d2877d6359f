use std::path::Path;
use warden_core::scheduler::GenerationRequest;

use crate::output::print_json;

pub fn run(
    root: &Path,
    tier: &str,
    prompt: &str,
    min_length: usize,
    system: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let mut req = GenerationRequest::new(tier, prompt).with_min_length(min_length);
    req.system = system;

    let rt = tokio::runtime::Runtime::new()?;
    let generation = rt.block_on(async {
        let scheduler = super::build_scheduler(&cfg)?;
        anyhow::Ok(scheduler.run(&req).await?)
    })?;

    if json {
        return print_json(&generation);
    }
    if generation.is_low_confidence() {
        eprintln!(
            "warning: output from '{}' is shorter than {min_length} characters",
            generation.tier
        );
    }
    println!("{}", generation.text);
    Ok(())
}
