//! Core domain types and traits for the Slipway deploy queue.
//!
//! This crate contains:
//! - The build request payload and its disposition contract
//! - Cluster connection types and the namespace/job trait
//! - Platform API, task dispatch and event stream seams
//! - The error taxonomy shared by every component

pub mod build;
pub mod cluster;
pub mod error;
pub mod events;
pub mod platform;
pub mod tasks;

pub use build::{BuildRequest, DeploymentRef, Disposition, MonitorPayload};
pub use cluster::{BuildNamespace, ClusterConnection, ClusterConnector, ClusterInfo, JobRecord};
pub use error::{Error, Result};
pub use events::{EventLevel, EventSink};
pub use platform::{DeploymentPatch, DeploymentStatus, PlatformApi};
pub use tasks::TaskDispatch;
