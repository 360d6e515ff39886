//! Deploy event stream seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Severity of an emitted deploy event, as the downstream stream names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Start,
    Error,
}

/// Sink for human-facing deploy events (build started, build failed).
///
/// Best effort: implementations swallow their own transport failures. The
/// authoritative state lives on the cluster, not in this stream.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(
        &self,
        level: EventLevel,
        project: &str,
        event: &str,
        meta: serde_json::Value,
        message: &str,
    );
}
