//! Cluster connection types and the namespace/job seam.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Result;

/// Connection details for the cluster that hosts a project, as returned by
/// the platform API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub console_url: Url,
    pub token: String,
}

/// Everything needed to talk to one namespace on one cluster.
///
/// Built fresh for every message; tokens and endpoints may rotate between
/// deliveries, so connections are never cached across requests.
#[derive(Debug, Clone)]
pub struct ClusterConnection {
    pub endpoint: Url,
    pub token: String,
    pub namespace: String,
}

/// Projection of a cluster Job as this core sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub name: String,
    /// Server-assigned unique id, recorded on the deployment as `remoteId`.
    pub uid: String,
    /// Pods still running for this Job.
    pub active: i32,
    pub labels: BTreeMap<String, String>,
}

/// Operations on the build namespace of a connected cluster.
///
/// `get_job`/`create_job` errors arrive pre-classified: lookup failures are
/// abandon-class (`Error::Cluster`), creation failures requeue-class
/// (`Error::JobCreate`).
#[async_trait]
pub trait BuildNamespace: Send + Sync {
    /// Number of build-labelled Jobs with at least one pod still active.
    async fn active_builds(&self) -> Result<usize>;

    /// Fetch a Job by name; `Ok(None)` when the cluster has no such Job.
    async fn get_job(&self, name: &str) -> Result<Option<JobRecord>>;

    /// Create a Job from a fully-formed manifest and return its record.
    async fn create_job(&self, name: &str, manifest: &serde_json::Value) -> Result<JobRecord>;

    /// Take the short-lived namespace admission lease. Returns `false` when
    /// another holder currently owns it.
    async fn acquire_admission(&self, holder: &str) -> Result<bool>;

    /// Give the admission lease back. Best effort; implementations log and
    /// swallow their own failures.
    async fn release_admission(&self, holder: &str);
}

/// Builds a namespace handle from per-request connection details.
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    async fn connect(&self, conn: &ClusterConnection) -> Result<Box<dyn BuildNamespace>>;
}
