//! Agent driver: runs a task plan one step at a time.
//!
//! Generation steps go through the [`ModelScheduler`]; action steps go
//! through the [`ActionGate`] and, once allowed, an [`ActionExecutor`]. A
//! `stop` (explicit or by timeout) aborts the remaining steps.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::gate::ActionGate;
use crate::ram::RamProbe;
use crate::runtime::InferenceRuntime;
use crate::scheduler::{Confidence, GenerationRequest, ModelScheduler};
use crate::types::{ActionType, Decision, NewAction};

/// Edited actions re-submitted more than this many times are stopped.
pub const MAX_EDIT_ROUNDS: u32 = 3;

/// Placeholder in a generate prompt replaced by the previous step's output.
pub const LAST_OUTPUT_PLACEHOLDER: &str = "{{last_output}}";

// ---------------------------------------------------------------------------
// TaskPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Generate {
        tier: String,
        prompt: String,
        #[serde(default)]
        min_length: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        system: Option<String>,
    },
    Action(NewAction),
}

impl TaskPlan {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let plan: TaskPlan = serde_yaml::from_str(&data)?;
        Ok(plan)
    }

    /// Reject malformed action steps before anything runs.
    pub fn validate(&self) -> Result<()> {
        for step in &self.steps {
            if let Step::Action(action) = step {
                action.validate()?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ActionExecutor
// ---------------------------------------------------------------------------

/// Performs an approved action.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, action: &NewAction) -> impl Future<Output = Result<()>> + Send;
}

/// Executor that only records the approved action in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExecutor;

impl ActionExecutor for LogExecutor {
    async fn execute(&self, action: &NewAction) -> Result<()> {
        tracing::info!(
            action_type = %action.action_type,
            description = %action.description,
            target = ?action.target,
            "executing approved action"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TaskReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Generated {
        tier: String,
        model: String,
        confidence: Confidence,
        text: String,
    },
    Executed {
        action_type: ActionType,
        edits: u32,
    },
    Skipped {
        action_type: ActionType,
    },
    Stopped {
        action_type: ActionType,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Aborted { step: usize },
    Failed { step: usize, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub plan: String,
    #[serde(flatten)]
    pub status: TaskStatus,
    pub steps: Vec<StepRecord>,
}

impl TaskReport {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn low_confidence_steps(&self) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| {
                matches!(
                    s.outcome,
                    StepOutcome::Generated {
                        confidence: Confidence::Low,
                        ..
                    }
                )
            })
            .map(|s| s.index)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// AgentDriver
// ---------------------------------------------------------------------------

pub struct AgentDriver<R, P, E> {
    scheduler: ModelScheduler<R, P>,
    gate: ActionGate,
    executor: E,
}

impl<R, P, E> AgentDriver<R, P, E>
where
    R: InferenceRuntime,
    P: RamProbe,
    E: ActionExecutor,
{
    pub fn new(scheduler: ModelScheduler<R, P>, gate: ActionGate, executor: E) -> Self {
        Self {
            scheduler,
            gate,
            executor,
        }
    }

    pub fn scheduler(&self) -> &ModelScheduler<R, P> {
        &self.scheduler
    }

    pub fn gate(&self) -> &ActionGate {
        &self.gate
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run every step of `plan` in order. Always unloads the resident model
    /// before returning.
    pub async fn run(&self, plan: &TaskPlan) -> TaskReport {
        tracing::info!(plan = %plan.name, steps = plan.steps.len(), "task started");
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut status = TaskStatus::Completed;
        let mut last_output = String::new();

        for (index, step) in plan.steps.iter().enumerate() {
            let outcome = match step {
                Step::Generate {
                    tier,
                    prompt,
                    min_length,
                    system,
                } => {
                    let mut req =
                        GenerationRequest::new(tier, prompt.replace(LAST_OUTPUT_PLACEHOLDER, &last_output))
                            .with_min_length(*min_length);
                    req.system = system.clone();
                    self.generate(&req).await
                }
                Step::Action(action) => self.act(action).await,
            };

            match &outcome {
                StepOutcome::Generated {
                    text, confidence, ..
                } => {
                    if *confidence == Confidence::Low {
                        tracing::warn!(step = index, "continuing with low-confidence output");
                    }
                    last_output = text.clone();
                }
                StepOutcome::Stopped { .. } => status = TaskStatus::Aborted { step: index },
                StepOutcome::Failed { error } => {
                    status = TaskStatus::Failed {
                        step: index,
                        error: error.clone(),
                    }
                }
                StepOutcome::Executed { .. } | StepOutcome::Skipped { .. } => {}
            }
            steps.push(StepRecord { index, outcome });
            if status != TaskStatus::Completed {
                break;
            }
        }

        self.scheduler.unload_all().await;
        match &status {
            TaskStatus::Completed => tracing::info!(plan = %plan.name, "task completed"),
            TaskStatus::Aborted { step } => {
                tracing::warn!(plan = %plan.name, step, "task aborted by stop")
            }
            TaskStatus::Failed { step, error } => {
                tracing::error!(plan = %plan.name, step, error = %error, "task failed")
            }
        }
        TaskReport {
            plan: plan.name.clone(),
            status,
            steps,
        }
    }

    async fn generate(&self, req: &GenerationRequest) -> StepOutcome {
        match self.scheduler.run(req).await {
            Ok(g) => StepOutcome::Generated {
                tier: g.tier,
                model: g.model,
                confidence: g.confidence,
                text: g.text,
            },
            Err(e) => StepOutcome::Failed {
                error: e.to_string(),
            },
        }
    }

    async fn act(&self, action: &NewAction) -> StepOutcome {
        let mut action = action.clone();
        let mut edits = 0;
        loop {
            let decision = match self.gate.request(action.clone()).await {
                Ok(d) => d,
                Err(e) => {
                    return StepOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            let action_type = action.action_type;
            match decision {
                Decision::Allow | Decision::AllowAll => {
                    return match self.executor.execute(&action).await {
                        Ok(()) => StepOutcome::Executed { action_type, edits },
                        Err(e) => StepOutcome::Failed {
                            error: e.to_string(),
                        },
                    };
                }
                Decision::Skip => return StepOutcome::Skipped { action_type },
                Decision::Stop => return StepOutcome::Stopped { action_type },
                Decision::Edit(payload) => {
                    if edits >= MAX_EDIT_ROUNDS {
                        tracing::warn!(edits, "too many edit rounds; stopping");
                        return StepOutcome::Stopped { action_type };
                    }
                    if let Err(e) = action.apply_edit(payload) {
                        tracing::warn!(error = %e, "edit payload rejected; stopping");
                        return StepOutcome::Stopped { action_type };
                    }
                    edits += 1;
                    tracing::info!(edits, "re-submitting edited action");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
