use tracing::{debug, info};

use crate::client::RigApi;
use crate::error::ApiClientError;
use crate::types::{ActionResult, MinerStatus, RigAction, RigStatus};

/// Drives a rig toward a target state with at most one mutating call.
///
/// Unknown or unreadable state is treated asymmetrically: `activate` only
/// skips when the rig is known to be mining, `deactivate` only skips when it
/// is known to be stopped. A rig we cannot read is assumed to still be
/// consuming resources, so it gets a STOP but is never skipped for START.
#[derive(Debug, Clone)]
pub struct RigStateReconciler<A> {
    api: A,
}

impl<A: RigApi> RigStateReconciler<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn activate(&self, rig_id: &str) -> Result<ActionResult, ApiClientError> {
        info!("Activating rig: {}", rig_id);
        let observed = self.observe(rig_id).await?;

        if observed == MinerStatus::Mining {
            info!(rig_id, "Already MINING");
            return Ok(ActionResult::none(rig_id));
        }

        self.issue(rig_id, RigAction::Start).await
    }

    pub async fn deactivate(&self, rig_id: &str) -> Result<ActionResult, ApiClientError> {
        info!("Deactivating rig: {}", rig_id);
        let observed = self.observe(rig_id).await?;

        if observed == MinerStatus::Stopped {
            info!(rig_id, "Already STOPPED");
            return Ok(ActionResult::none(rig_id));
        }

        self.issue(rig_id, RigAction::Stop).await
    }

    /// An absent status document counts as `Unknown`.
    async fn observe(&self, rig_id: &str) -> Result<MinerStatus, ApiClientError> {
        let status = self.api.get_rig_status(rig_id).await?;
        let observed = status.map_or(MinerStatus::Unknown, |s: RigStatus| s.miner_status);
        debug!(rig_id, status = %observed, "Observed rig state");
        Ok(observed)
    }

    async fn issue(&self, rig_id: &str, action: RigAction) -> Result<ActionResult, ApiClientError> {
        let response = self.api.update_rig_status(rig_id, action).await?;
        info!(rig_id, action = action.as_str(), "Rig status update accepted");
        Ok(ActionResult {
            rig_id: rig_id.to_string(),
            action_taken: action.into(),
            response_body: Some(response),
        })
    }
}
