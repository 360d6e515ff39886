//! Build admission over observed namespace state.

use tracing::debug;

use slipway_core::{BuildNamespace, Result};

/// A namespace is free when no build-labelled Job has active pods.
///
/// A listing failure reads as "cannot admit": unknown cluster state is
/// treated the same as an occupied namespace rather than risking a
/// double-running build, and the caller abandons the message.
pub async fn is_namespace_free(namespace: &dyn BuildNamespace) -> Result<bool> {
    let active = namespace.active_builds().await?;
    debug!(active, "Checked namespace for active builds");
    Ok(active == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use slipway_core::{Error, JobRecord};

    struct StaticNamespace {
        active: usize,
        fail: bool,
    }

    #[async_trait]
    impl BuildNamespace for StaticNamespace {
        async fn active_builds(&self) -> Result<usize> {
            if self.fail {
                return Err(Error::Cluster("listing timed out".into()));
            }
            Ok(self.active)
        }

        async fn get_job(&self, _name: &str) -> Result<Option<JobRecord>> {
            unimplemented!()
        }

        async fn create_job(
            &self,
            _name: &str,
            _manifest: &serde_json::Value,
        ) -> Result<JobRecord> {
            unimplemented!()
        }

        async fn acquire_admission(&self, _holder: &str) -> Result<bool> {
            unimplemented!()
        }

        async fn release_admission(&self, _holder: &str) {}
    }

    #[tokio::test]
    async fn free_when_nothing_is_active() {
        let ns = StaticNamespace {
            active: 0,
            fail: false,
        };
        assert!(is_namespace_free(&ns).await.unwrap());
    }

    #[tokio::test]
    async fn occupied_when_any_build_is_active() {
        let ns = StaticNamespace {
            active: 2,
            fail: false,
        };
        assert!(!is_namespace_free(&ns).await.unwrap());
    }

    #[tokio::test]
    async fn listing_errors_propagate_as_abandon_class() {
        let ns = StaticNamespace {
            active: 0,
            fail: true,
        };
        let err = is_namespace_free(&ns).await.unwrap_err();
        assert!(matches!(err, Error::Cluster(_)));
        assert!(!err.is_retryable());
    }
}
