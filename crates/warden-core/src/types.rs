use crate::error::{Result, WardenError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionType
// ---------------------------------------------------------------------------

/// Kind of side-effecting action the agent wants to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    Type,
    Scroll,
    Extract,
    Submit,
    Other,
}

impl ActionType {
    pub fn all() -> &'static [ActionType] {
        &[
            ActionType::Click,
            ActionType::Type,
            ActionType::Scroll,
            ActionType::Extract,
            ActionType::Submit,
            ActionType::Other,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Scroll => "scroll",
            ActionType::Extract => "extract",
            ActionType::Submit => "submit",
            ActionType::Other => "other",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = WardenError;
    fn from_str(s: &str) -> Result<Self> {
        ActionType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| WardenError::UnknownActionType(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Target / ActionParams
// ---------------------------------------------------------------------------

/// Screen coordinates an action points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub x: i32,
    pub y: i32,
}

/// Action parameters, shaped per action type.
///
/// Used both for the parameters of a request and as the replacement payload
/// carried by an `edit` decision. The variant must always agree with the
/// request's [`ActionType`]; [`ActionParams::validate_for`] enforces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionParams {
    Click { x: i32, y: i32 },
    Type { text: String },
    Scroll { dx: i32, dy: i32 },
    Extract { selector: String },
    Submit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Other { value: serde_json::Value },
}

impl ActionParams {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionParams::Click { .. } => ActionType::Click,
            ActionParams::Type { .. } => ActionType::Type,
            ActionParams::Scroll { .. } => ActionType::Scroll,
            ActionParams::Extract { .. } => ActionType::Extract,
            ActionParams::Submit { .. } => ActionType::Submit,
            ActionParams::Other { .. } => ActionType::Other,
        }
    }

    /// Check that these parameters describe an action of type `expected`.
    pub fn validate_for(&self, expected: ActionType) -> Result<()> {
        let actual = self.action_type();
        if actual != expected {
            return Err(WardenError::InvalidEditPayload(format!(
                "payload kind '{actual}' does not match action type '{expected}'"
            )));
        }
        match self {
            ActionParams::Click { x, y } if *x < 0 || *y < 0 => Err(
                WardenError::InvalidEditPayload(format!("negative click coordinates ({x}, {y})")),
            ),
            ActionParams::Type { text } if text.is_empty() => Err(
                WardenError::InvalidEditPayload("type payload has empty text".into()),
            ),
            ActionParams::Extract { selector } if selector.trim().is_empty() => Err(
                WardenError::InvalidEditPayload("extract payload has empty selector".into()),
            ),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// NewAction / ActionRequest
// ---------------------------------------------------------------------------

/// An action the agent is about to perform, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    pub action_type: ActionType,
    pub description: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ActionParams>,
}

impl NewAction {
    pub fn new(action_type: ActionType, description: impl Into<String>, confidence: f64) -> Self {
        Self {
            action_type,
            description: description.into(),
            confidence,
            target: None,
            params: None,
        }
    }

    pub fn with_target(mut self, x: i32, y: i32) -> Self {
        self.target = Some(Target { x, y });
        self
    }

    pub fn with_params(mut self, params: ActionParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(WardenError::InvalidConfidence(self.confidence));
        }
        if let Some(p) = &self.params {
            p.validate_for(self.action_type)?;
        }
        Ok(())
    }

    /// Replace this action's parameters with an edited payload.
    ///
    /// A click payload also moves the target to the new coordinates.
    pub fn apply_edit(&mut self, payload: ActionParams) -> Result<()> {
        payload.validate_for(self.action_type)?;
        if let ActionParams::Click { x, y } = payload {
            self.target = Some(Target { x, y });
        }
        self.params = Some(payload);
        Ok(())
    }
}

/// A proposed side-effecting action awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,
    pub action_type: ActionType,
    pub description: String,
    pub confidence: f64,
    #[serde(flatten)]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ActionParams>,
    pub created_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, action: NewAction, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            action_type: action.action_type,
            description: action.description,
            confidence: action.confidence,
            target: action.target,
            params: action.params,
            created_at,
        }
    }
}

/// Fresh correlation id: `perm-` plus eight hex characters.
pub fn new_action_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("perm-{}", &hex[..8])
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A human (or policy) verdict on one action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DecisionWire", try_from = "DecisionWire")]
pub enum Decision {
    Allow,
    AllowAll,
    Skip,
    Stop,
    Edit(ActionParams),
}

impl Decision {
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Allow => DecisionKind::Allow,
            Decision::AllowAll => DecisionKind::AllowAll,
            Decision::Skip => DecisionKind::Skip,
            Decision::Stop => DecisionKind::Stop,
            Decision::Edit(_) => DecisionKind::Edit,
        }
    }

    /// Build a decision from its wire parts. `edit` requires a payload;
    /// the other kinds ignore one if present.
    pub fn from_parts(kind: DecisionKind, payload: Option<ActionParams>) -> Result<Self> {
        Ok(match kind {
            DecisionKind::Allow => Decision::Allow,
            DecisionKind::AllowAll => Decision::AllowAll,
            DecisionKind::Skip => Decision::Skip,
            DecisionKind::Stop => Decision::Stop,
            DecisionKind::Edit => Decision::Edit(payload.ok_or_else(|| {
                WardenError::InvalidEditPayload("edit decision requires edit_payload".into())
            })?),
        })
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Allow,
    AllowAll,
    Skip,
    Stop,
    Edit,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Allow => "allow",
            DecisionKind::AllowAll => "allow_all",
            DecisionKind::Skip => "skip",
            DecisionKind::Stop => "stop",
            DecisionKind::Edit => "edit",
        }
    }
}

impl std::str::FromStr for DecisionKind {
    type Err = WardenError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(DecisionKind::Allow),
            "allow_all" => Ok(DecisionKind::AllowAll),
            "skip" => Ok(DecisionKind::Skip),
            "stop" => Ok(DecisionKind::Stop),
            "edit" => Ok(DecisionKind::Edit),
            _ => Err(WardenError::InvalidDecision(s.to_string())),
        }
    }
}

/// JSON shape of a decision: `{"decision": "edit", "edit_payload": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionWire {
    pub decision: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_payload: Option<ActionParams>,
}

impl From<Decision> for DecisionWire {
    fn from(d: Decision) -> Self {
        let decision = d.kind();
        let edit_payload = match d {
            Decision::Edit(p) => Some(p),
            _ => None,
        };
        DecisionWire {
            decision,
            edit_payload,
        }
    }
}

impl TryFrom<DecisionWire> for Decision {
    type Error = WardenError;
    fn try_from(w: DecisionWire) -> Result<Self> {
        Decision::from_parts(w.decision, w.edit_payload)
    }
}
