//! Build request payload and per-message disposition.

use serde::{Deserialize, Serialize};

use crate::cluster::JobRecord;
use crate::{Error, Result};

/// One build-deployment request as delivered by the task queue.
///
/// Immutable once received. `build_name` doubles as the cluster Job name and
/// is stable across redeliveries of the same request, which is what makes the
/// get-or-create path idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub build_name: String,
    pub project_name: String,
    /// Target namespace on the build cluster.
    #[serde(rename = "openshiftProject")]
    pub namespace: String,
    pub branch_name: String,
    #[serde(default)]
    pub sha: Option<String>,
    /// Full Job manifest, passed verbatim to the cluster create call.
    pub job_config: serde_json::Value,
    pub deployment: DeploymentRef,
}

/// Pointer to the deployment record this build belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRef {
    pub id: i64,
}

impl BuildRequest {
    /// Decode a raw queue payload. Failures are abandon-class: a payload that
    /// does not parse will not parse on redelivery either.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// The commit sha, with the original's empty-string-means-absent rule.
    pub fn sha(&self) -> Option<&str> {
        self.sha.as_deref().filter(|s| !s.is_empty())
    }
}

/// Follow-up payload for the monitor task that watches the submitted Job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorPayload {
    /// Resolved Job name as the cluster reports it.
    pub build_name: String,
    pub project_name: String,
    #[serde(rename = "openshiftProject")]
    pub namespace: String,
    pub branch_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Terminal classification of one processed build request.
///
/// The transport maps this onto its own ack semantics: `Requeue` asks for
/// redelivery after a backoff, `Abandon` drops the message without retry.
/// Every processing branch ends in exactly one of these.
#[derive(Debug)]
pub enum Disposition {
    /// The build was admitted; the Job is present on the cluster, the
    /// deployment record was updated and a monitor task is enqueued.
    Admitted { job: JobRecord },
    /// Admission blocked or creation failed; redeliver later.
    Requeue { reason: Error },
    /// Unexpected infrastructure failure; drop without redelivery.
    Abandon { error: Error },
}
