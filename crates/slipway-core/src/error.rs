//! Error types for Slipway.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Another build holds the namespace; the message should be redelivered.
    #[error("another build is already running in {namespace}: {detail}")]
    AdmissionBlocked { namespace: String, detail: String },

    /// The cluster rejected the Job create call.
    #[error("failed to create build job {name}: {message}")]
    JobCreate { name: String, message: String },

    /// The follow-up monitor task could not be enqueued.
    #[error("failed to dispatch monitor task: {0}")]
    Dispatch(String),

    /// Cluster connection info could not be resolved for a project.
    #[error("cluster lookup failed for project {project}: {message}")]
    ProjectLookup { project: String, message: String },

    /// A cluster call failed for a reason other than "not found".
    #[error("cluster request failed: {0}")]
    Cluster(String),

    /// The deployment record store rejected a status update.
    #[error("deployment record update failed: {0}")]
    RecordUpdate(String),

    /// The queue delivered a payload that does not decode as a build request.
    #[error("malformed build request payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl Error {
    /// Requeue-class failures. Everything else abandons the message: an
    /// ambiguous cluster-state error is treated the same as "occupied" and
    /// is not retried by this core.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::AdmissionBlocked { .. } | Error::JobCreate { .. } | Error::Dispatch(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
