use std::path::Path;

use anyhow::Context;
use warden_core::types::{ActionParams, ActionType, DecisionKind};

use crate::output::{print_json, print_table};

/// GET /permission/pending, oldest first.
pub fn pending(root: &Path, bridge: Option<&str>, json: bool) -> anyhow::Result<()> {
    let client = super::bridge_client(root, bridge)?;
    let pending = client.pending()?;
    if json {
        return print_json(&pending);
    }

    let entries = pending.as_array().cloned().unwrap_or_default();
    if entries.is_empty() {
        println!("No pending requests.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|r| {
            let target = match (r["x"].as_i64(), r["y"].as_i64()) {
                (Some(x), Some(y)) => format!("({x}, {y})"),
                _ => "-".to_string(),
            };
            vec![
                r["id"].as_str().unwrap_or_default().to_string(),
                r["action_type"].as_str().unwrap_or_default().to_string(),
                format!("{:.2}", r["confidence"].as_f64().unwrap_or_default()),
                target,
                r["description"].as_str().unwrap_or_default().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "TYPE", "CONFIDENCE", "TARGET", "DESCRIPTION"], rows);
    Ok(())
}

pub fn decide(
    root: &Path,
    bridge: Option<&str>,
    id: &str,
    decision: &str,
    payload: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let kind: DecisionKind = decision.parse()?;
    let payload = payload
        .map(|p| {
            let params: ActionParams =
                serde_json::from_str(p).context("--payload must be a JSON edit payload")?;
            anyhow::Ok(serde_json::to_value(params)?)
        })
        .transpose()?;

    let client = super::bridge_client(root, bridge)?;
    let body = client.decide(id, kind.as_str(), payload)?;
    if json {
        return print_json(&body);
    }
    if body["duplicate"].as_bool().unwrap_or(false) {
        println!(
            "{id} was already decided: {}",
            body["decision"].as_str().unwrap_or_default()
        );
    } else {
        println!("{id}: {}", kind.as_str());
    }
    Ok(())
}

pub fn allow_all(root: &Path, bridge: Option<&str>, minutes: u64, json: bool) -> anyhow::Result<()> {
    let client = super::bridge_client(root, bridge)?;
    let body = client.set_allow_all(minutes)?;
    if json {
        return print_json(&body);
    }
    if minutes == 0 {
        println!("Override window revoked.");
    } else {
        println!(
            "Auto-approving all actions until {}.",
            body["expires_at"].as_str().unwrap_or("?")
        );
    }
    Ok(())
}

pub fn allow_all_status(root: &Path, bridge: Option<&str>, json: bool) -> anyhow::Result<()> {
    let client = super::bridge_client(root, bridge)?;
    let body = client.allow_all_status()?;
    if json {
        return print_json(&body);
    }
    if body["active"].as_bool().unwrap_or(false) {
        let secs = body["time_remaining_seconds"].as_i64().unwrap_or(0);
        println!("Override window active: {}m {}s remaining", secs / 60, secs % 60);
    } else {
        println!("Override window inactive.");
    }
    Ok(())
}

pub fn skip(
    root: &Path,
    bridge: Option<&str>,
    action_type: &str,
    off: bool,
    json: bool,
) -> anyhow::Result<()> {
    let action_type: ActionType = action_type.parse()?;
    let client = super::bridge_client(root, bridge)?;
    let body = client.set_skip(action_type.as_str(), !off)?;
    if json {
        return print_json(&body);
    }
    let list: Vec<_> = body["skip_types"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    if list.is_empty() {
        println!("Skip set is empty.");
    } else {
        println!("Auto-skipping: {}", list.join(", "));
    }
    Ok(())
}
