//! Platform API client for the Slipway deploy queue.
//!
//! Talks to the platform that owns projects and deployment records:
//! - Project → cluster connection lookup, once per consumed message
//! - Deployment record status updates

pub mod client;

pub use client::{PlatformClient, PlatformConfig};
