//! Namespace admission lease.
//!
//! Build submission is guarded by a single named Lease per namespace. The
//! lease is acquired before the active-build check and held across the Job
//! create call, closing the window in which two consumers could both observe
//! an idle namespace. Acquisition is atomic: creation relies on the server
//! enforcing name uniqueness, and takeover of an expired lease goes through
//! `replace` with the observed `resourceVersion`.

use chrono::{DateTime, TimeDelta, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::MicroTime;
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams};
use kube::Client;
use tracing::debug;

use slipway_core::{Error, Result};

/// Name of the per-namespace admission lease object.
pub const ADMISSION_LEASE_NAME: &str = "slipway-build-admission";

/// Handle on the admission lease of one namespace.
pub struct AdmissionLease {
    api: Api<Lease>,
    namespace: String,
    ttl_seconds: i32,
}

impl AdmissionLease {
    pub fn new(client: Client, namespace: &str, ttl_seconds: i32) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            ttl_seconds,
        }
    }

    /// Try to take the lease for `holder`. Returns `false` when another
    /// holder owns an unexpired lease or wins the race for this one.
    ///
    /// The same holder re-acquiring (a redelivery of the same build) renews
    /// the existing lease rather than being blocked by it.
    pub async fn try_acquire(&self, holder: &str) -> Result<bool> {
        let now = Utc::now();
        match self.api.get_opt(ADMISSION_LEASE_NAME).await.map_err(cluster_err)? {
            None => {
                let lease = claimed(Lease::default(), holder, self.ttl_seconds, now);
                match self.api.create(&PostParams::default(), &lease).await {
                    Ok(_) => Ok(true),
                    Err(e) if is_api_code(&e, 409) => Ok(false),
                    Err(e) => Err(cluster_err(e)),
                }
            }
            Some(lease) => {
                if holder_of(&lease) != Some(holder) && !is_expired(&lease, now) {
                    return Ok(false);
                }
                let lease = claimed(lease, holder, self.ttl_seconds, now);
                match self.api.replace(ADMISSION_LEASE_NAME, &PostParams::default(), &lease).await {
                    Ok(_) => Ok(true),
                    Err(e) if is_api_code(&e, 409) => Ok(false),
                    Err(e) => Err(cluster_err(e)),
                }
            }
        }
    }

    /// Delete the lease if `holder` still owns it. Best effort; a lease left
    /// behind expires on its own after the TTL.
    pub async fn release(&self, holder: &str) {
        match self.api.get_opt(ADMISSION_LEASE_NAME).await {
            Ok(Some(lease)) if holder_of(&lease) == Some(holder) => {
                if let Err(e) = self.api.delete(ADMISSION_LEASE_NAME, &DeleteParams::default()).await {
                    debug!(namespace = %self.namespace, error = %e, "Failed to release admission lease");
                }
            }
            Ok(_) => {}
            Err(e) => {
                debug!(namespace = %self.namespace, error = %e, "Failed to read admission lease on release");
            }
        }
    }
}

fn cluster_err(err: kube::Error) -> Error {
    Error::Cluster(err.to_string())
}

fn is_api_code(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

fn holder_of(lease: &Lease) -> Option<&str> {
    lease.spec.as_ref()?.holder_identity.as_deref()
}

fn is_expired(lease: &Lease, now: DateTime<Utc>) -> bool {
    let Some(spec) = lease.spec.as_ref() else {
        return true;
    };
    let Some(renewed) = spec.renew_time.as_ref().or(spec.acquire_time.as_ref()) else {
        return true;
    };
    let ttl = TimeDelta::seconds(i64::from(spec.lease_duration_seconds.unwrap_or(0)));
    renewed.0 + ttl <= now
}

/// Stamp `holder` onto a lease, preserving `resourceVersion` so the replace
/// call conflicts if someone else got there first. A change of holder counts
/// as a transition and resets the acquire time; the same holder just renews.
fn claimed(mut lease: Lease, holder: &str, ttl_seconds: i32, now: DateTime<Utc>) -> Lease {
    let transition = holder_of(&lease) != Some(holder);
    if lease.metadata.name.is_none() {
        lease.metadata = ObjectMeta {
            name: Some(ADMISSION_LEASE_NAME.to_string()),
            ..ObjectMeta::default()
        };
    }
    let spec = lease.spec.get_or_insert_with(LeaseSpec::default);
    if transition {
        spec.lease_transitions = Some(spec.lease_transitions.unwrap_or(0) + 1);
        spec.acquire_time = Some(MicroTime(now));
        spec.holder_identity = Some(holder.to_string());
    }
    spec.renew_time = Some(MicroTime(now));
    spec.lease_duration_seconds = Some(ttl_seconds);
    lease
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn lease_held_by(holder: &str, renewed_at: DateTime<Utc>, ttl_seconds: i32) -> Lease {
        claimed(Lease::default(), holder, ttl_seconds, renewed_at)
    }

    #[test]
    fn fresh_lease_is_not_expired() {
        let now = Utc::now();
        let lease = lease_held_by("build-1", now, 60);
        assert!(!is_expired(&lease, now + TimeDelta::seconds(59)));
    }

    #[test]
    fn lease_expires_after_ttl() {
        let now = Utc::now();
        let lease = lease_held_by("build-1", now, 60);
        assert!(is_expired(&lease, now + TimeDelta::seconds(60)));
    }

    #[test]
    fn lease_without_spec_counts_as_expired() {
        assert!(is_expired(&Lease::default(), Utc::now()));
    }

    #[test]
    fn takeover_swaps_holder_and_counts_a_transition() {
        let then = Utc::now();
        let lease = lease_held_by("build-1", then, 60);
        let taken = claimed(lease, "build-2", 60, then + TimeDelta::seconds(120));
        let spec = taken.spec.unwrap();
        assert_eq!(spec.holder_identity.as_deref(), Some("build-2"));
        assert_eq!(spec.lease_transitions, Some(2));
        assert_eq!(spec.acquire_time, spec.renew_time);
    }

    #[test]
    fn renewal_keeps_acquire_time() {
        let then = Utc::now();
        let lease = lease_held_by("build-1", then, 60);
        let renewed = claimed(lease, "build-1", 60, then + TimeDelta::seconds(30));
        let spec = renewed.spec.unwrap();
        assert_eq!(spec.holder_identity.as_deref(), Some("build-1"));
        assert_eq!(spec.lease_transitions, Some(1));
        assert_eq!(spec.acquire_time.unwrap().0, then);
        assert_ne!(spec.renew_time.unwrap().0, then);
    }
}
