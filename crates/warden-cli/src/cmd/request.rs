use std::path::Path;
use std::time::{Duration, Instant};

use warden_core::config::Config;
use warden_core::types::ActionType;

use crate::output::print_json;

pub struct RequestArgs {
    pub action_type: String,
    pub description: String,
    pub confidence: f64,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub timeout_secs: Option<u64>,
}

/// Enqueue an action on a running bridge and wait for its decision.
///
/// A request that times out is withdrawn from the bridge and resolves to
/// `stop`, unless a decision landed before the withdrawal.
pub fn run(root: &Path, bridge: Option<&str>, args: RequestArgs, json: bool) -> anyhow::Result<()> {
    let action_type: ActionType = args.action_type.parse()?;
    let cfg = Config::load(root)?;
    let client = super::bridge_client(root, bridge)?;

    let mut body = serde_json::json!({
        "action_type": action_type.as_str(),
        "description": args.description,
        "confidence": args.confidence,
    });
    if let Some(x) = args.x {
        body["x"] = x.into();
    }
    if let Some(y) = args.y {
        body["y"] = y.into();
    }

    let admitted = client.request(body)?;
    let (id, decision) = match admitted["status"].as_str() {
        Some("auto_allowed") => (None, serde_json::json!({ "decision": "allow" })),
        Some("auto_skipped") => (None, serde_json::json!({ "decision": "skip" })),
        _ => {
            let id = admitted["id"].as_str().unwrap_or_default().to_string();
            let timeout = Duration::from_secs(args.timeout_secs.unwrap_or(cfg.gate.timeout_secs));
            let poll = Duration::from_millis(cfg.gate.poll_interval_ms.max(1));
            if !json {
                eprintln!("waiting for a decision on {id} (timeout {}s)", timeout.as_secs());
            }
            let decision = wait(&client, &id, poll, timeout)?;
            (Some(id), decision)
        }
    };

    if json {
        return print_json(&serde_json::json!({ "id": id, "result": decision }));
    }
    println!("{}", decision["decision"].as_str().unwrap_or("stop"));
    if let Some(payload) = decision.get("edit_payload") {
        println!("{payload}");
    }
    Ok(())
}

fn wait(
    client: &crate::bridge_client::BridgeClient,
    id: &str,
    poll: Duration,
    timeout: Duration,
) -> anyhow::Result<serde_json::Value> {
    let deadline = Instant::now() + timeout;
    let mut timed_out = false;
    loop {
        let result = client.result(id)?;
        match result["decision"].as_str() {
            Some("pending") => {}
            Some("not_found") | None => {
                tracing::warn!(id, "request vanished from the bridge; stopping");
                return Ok(serde_json::json!({ "decision": "stop" }));
            }
            Some(_) => break,
        }
        let now = Instant::now();
        if now >= deadline {
            timed_out = true;
            break;
        }
        std::thread::sleep(poll.min(deadline - now));
    }

    // Removes the entry either way; a decision that landed first is kept.
    let finished = client.finish(id)?;
    if timed_out && finished["decision"] == "stop" {
        tracing::warn!(id, "no decision before timeout; stopping");
    }
    Ok(flatten_allow_all(finished))
}

fn flatten_allow_all(result: serde_json::Value) -> serde_json::Value {
    if result["decision"] == "allow_all" {
        serde_json::json!({ "decision": "allow" })
    } else {
        result
    }
}
