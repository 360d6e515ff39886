//! Kubernetes backend for the Slipway deploy queue.
//!
//! Implements the cluster seam from `slipway-core`:
//! - Per-request client construction from resolved connection details
//! - Job get/create/list over the build namespace
//! - The namespace admission lease guarding build submission

pub mod admission;
pub mod namespace;

pub use admission::{ADMISSION_LEASE_NAME, AdmissionLease};
pub use namespace::{
    BUILD_JOB_SELECTOR, ClusterNamespace, DEFAULT_ADMISSION_TTL_SECONDS, KubeConnector,
};
