//! Build-deploy queue consumer.
//!
//! Receives one build-deployment request at a time from the task queue and
//! turns it into exactly one cluster Job, keeping at most one build active
//! per target namespace. The transport owns delivery and retry mechanics;
//! this crate owns the per-message state machine and hands back an explicit
//! [`slipway_core::Disposition`] for every delivery.

pub mod admission;
pub mod consumer;
pub mod jobs;

pub use consumer::{Consumer, MONITOR_TASK};
