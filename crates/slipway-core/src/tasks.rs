//! Follow-up task dispatch seam.

use async_trait::async_trait;

use crate::Result;
use crate::build::MonitorPayload;

/// Enqueues follow-up tasks on the queue this core consumes from.
#[async_trait]
pub trait TaskDispatch: Send + Sync {
    /// Enqueue a monitor task that watches an already-submitted Job to
    /// completion. This core does not itself wait for the Job.
    async fn enqueue_monitor(&self, task: &str, payload: &MonitorPayload) -> Result<()>;
}
