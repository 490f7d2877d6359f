use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use warden_core::driver::{AgentDriver, LogExecutor, StepOutcome, TaskPlan, TaskReport, TaskStatus};
use warden_core::gate::ActionGate;
use warden_core::hub::PermissionHub;
use warden_core::paths;
use warden_server::AppState;

use crate::output::{print_json, print_table};

pub fn run(root: &Path, plan: &str, no_bridge: bool, json: bool) -> anyhow::Result<()> {
    let cfg = super::load_config(root)?;
    let plan_path = paths::plan_path(root, plan);
    let plan = TaskPlan::load(&plan_path)
        .with_context(|| format!("failed to load plan {}", plan_path.display()))?;
    plan.validate()?;

    let hub = Arc::new(PermissionHub::from_config(&cfg.gate));
    let gate = ActionGate::from_config(hub.clone(), &cfg.gate);
    let scheduler = super::build_scheduler(&cfg)?;
    let driver = AgentDriver::new(scheduler, gate, LogExecutor);

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let bridge = if no_bridge {
            None
        } else {
            let listener = tokio::net::TcpListener::bind(cfg.bridge.addr())
                .await
                .with_context(|| format!("failed to bind bridge on {}", cfg.bridge.addr()))?;
            let state = AppState::new(hub.clone(), Duration::from_millis(cfg.gate.poll_interval_ms));
            Some(tokio::spawn(warden_server::serve_on(listener, state)))
        };

        let report = driver.run(&plan).await;
        if let Some(handle) = bridge {
            handle.abort();
        }
        anyhow::Ok(report)
    })?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    match &report.status {
        TaskStatus::Completed => Ok(()),
        TaskStatus::Aborted { step } => bail!("task '{}' stopped at step {step}", report.plan),
        TaskStatus::Failed { step, error } => {
            bail!("task '{}' failed at step {step}: {error}", report.plan)
        }
    }
}

fn print_report(report: &TaskReport) {
    let rows = report
        .steps
        .iter()
        .map(|s| {
            let (kind, detail) = match &s.outcome {
                StepOutcome::Generated {
                    tier,
                    confidence,
                    text,
                    ..
                } => (
                    "generated",
                    format!("{tier} ({confidence:?}, {} chars)", text.chars().count()),
                ),
                StepOutcome::Executed { action_type, edits } => {
                    ("executed", format!("{action_type} after {edits} edit(s)"))
                }
                StepOutcome::Skipped { action_type } => ("skipped", action_type.to_string()),
                StepOutcome::Stopped { action_type } => ("stopped", action_type.to_string()),
                StepOutcome::Failed { error } => ("failed", error.clone()),
            };
            vec![s.index.to_string(), kind.to_string(), detail]
        })
        .collect();
    println!("Task: {}", report.plan);
    print_table(&["STEP", "OUTCOME", "DETAIL"], rows);
}
