//! Platform API seam: project lookup and deployment records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::cluster::ClusterInfo;

/// Lifecycle states of a deployment record. This core only ever writes
/// `Pending`; the rest of the lifecycle is driven by the monitor task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    New,
    Pending,
    Running,
    Cancelled,
    Error,
    Failed,
    Complete,
}

/// Partial update applied to a deployment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPatch {
    pub status: DeploymentStatus,
    /// Cluster-side id of the Job backing this deployment.
    pub remote_id: String,
}

/// Client for the platform that owns projects and deployment records.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Resolve connection details for the cluster a project deploys to.
    /// Called once per message; results are never cached.
    async fn cluster_for_project(&self, project: &str) -> Result<ClusterInfo>;

    /// Record a status transition on a deployment.
    async fn update_deployment(&self, id: i64, patch: &DeploymentPatch) -> Result<()>;
}
