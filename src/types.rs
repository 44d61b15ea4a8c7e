use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API key triple used to sign every request. Never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub organization_id: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        organization_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            organization_id: organization_id.into(),
        }
    }
}

// Key and secret stay out of logs even through `{:?}`.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinerStatus {
    Mining,
    Stopped,
    /// Any status string the remote reports that we do not act on specially.
    Other(String),
    /// `minerStatus` missing or not a string.
    Unknown,
}

impl MinerStatus {
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("MINING") => MinerStatus::Mining,
            Some("STOPPED") => MinerStatus::Stopped,
            Some(other) => MinerStatus::Other(other.to_string()),
            None => MinerStatus::Unknown,
        }
    }
}

impl fmt::Display for MinerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerStatus::Mining => write!(f, "MINING"),
            MinerStatus::Stopped => write!(f, "STOPPED"),
            MinerStatus::Other(s) => write!(f, "{}", s),
            MinerStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Snapshot of a rig as returned by `GET /main/api/v2/mining/rig2/{rigId}`.
#[derive(Debug, Clone, PartialEq)]
pub struct RigStatus {
    pub rig_id: String,
    pub miner_status: MinerStatus,
    pub raw: Value,
}

impl RigStatus {
    /// Returns `None` for an absent status document (`null` or `{}`).
    pub fn from_json(rig_id: &str, raw: Value) -> Option<Self> {
        let absent = match &raw {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if absent {
            return None;
        }

        let miner_status = MinerStatus::from_wire(raw.get("minerStatus").and_then(Value::as_str));
        Some(Self {
            rig_id: rig_id.to_string(),
            miner_status,
            raw,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RigAction {
    Start,
    Stop,
}

impl RigAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RigAction::Start => "START",
            RigAction::Stop => "STOP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionTaken {
    None,
    Start,
    Stop,
}

impl From<RigAction> for ActionTaken {
    fn from(action: RigAction) -> Self {
        match action {
            RigAction::Start => ActionTaken::Start,
            RigAction::Stop => ActionTaken::Stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub rig_id: String,
    pub action_taken: ActionTaken,
    pub response_body: Option<Value>,
}

impl ActionResult {
    pub fn none(rig_id: &str) -> Self {
        Self {
            rig_id: rig_id.to_string(),
            action_taken: ActionTaken::None,
            response_body: None,
        }
    }
}

/// Body of `POST /main/api/v2/mining/rigs/status2`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRigStatusRequest {
    #[serde(rename = "rigId")]
    pub rig_id: String,
    pub action: RigAction,
}
