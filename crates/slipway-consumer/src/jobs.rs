//! Idempotent Job submission.

use tracing::info;

use slipway_core::{BuildNamespace, JobRecord, Result};

/// Fetch the Job named `name`, creating it from `manifest` when absent.
///
/// Redelivery of a request whose Job already exists returns the existing
/// record unchanged: no second create call is made and the Job is never
/// mutated.
pub async fn get_or_create_job(
    namespace: &dyn BuildNamespace,
    name: &str,
    manifest: &serde_json::Value,
) -> Result<JobRecord> {
    if let Some(job) = namespace.get_job(name).await? {
        info!(job = name, "Build job already exists");
        return Ok(job);
    }
    namespace.create_job(name, manifest).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use slipway_core::Error;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingNamespace {
        fail_get: bool,
        fail_create: bool,
        jobs: Mutex<HashMap<String, JobRecord>>,
        create_calls: AtomicUsize,
    }

    impl RecordingNamespace {
        fn with_job(name: &str, uid: &str) -> Self {
            let ns = Self::default();
            ns.jobs.lock().unwrap().insert(
                name.to_string(),
                JobRecord {
                    name: name.to_string(),
                    uid: uid.to_string(),
                    active: 0,
                    labels: Default::default(),
                },
            );
            ns
        }
    }

    #[async_trait]
    impl BuildNamespace for RecordingNamespace {
        async fn active_builds(&self) -> Result<usize> {
            unimplemented!()
        }

        async fn get_job(&self, name: &str) -> Result<Option<JobRecord>> {
            if self.fail_get {
                return Err(Error::Cluster("get timed out".into()));
            }
            Ok(self.jobs.lock().unwrap().get(name).cloned())
        }

        async fn create_job(
            &self,
            name: &str,
            _manifest: &serde_json::Value,
        ) -> Result<JobRecord> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(Error::JobCreate {
                    name: name.to_string(),
                    message: "quota exceeded".into(),
                });
            }
            let record = JobRecord {
                name: name.to_string(),
                uid: format!("uid-{name}"),
                active: 0,
                labels: Default::default(),
            };
            self.jobs
                .lock()
                .unwrap()
                .insert(name.to_string(), record.clone());
            Ok(record)
        }

        async fn acquire_admission(&self, _holder: &str) -> Result<bool> {
            unimplemented!()
        }

        async fn release_admission(&self, _holder: &str) {}
    }

    #[tokio::test]
    async fn creates_the_job_when_absent() {
        let ns = RecordingNamespace::default();
        let job = get_or_create_job(&ns, "b1", &json!({})).await.unwrap();
        assert_eq!(job.uid, "uid-b1");
        assert_eq!(ns.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_the_existing_job_without_creating() {
        let ns = RecordingNamespace::with_job("b1", "original-uid");
        let job = get_or_create_job(&ns, "b1", &json!({})).await.unwrap();
        assert_eq!(job.uid, "original-uid");
        assert_eq!(ns.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_errors_propagate_without_a_create_call() {
        let ns = RecordingNamespace {
            fail_get: true,
            ..Default::default()
        };
        let err = get_or_create_job(&ns, "b1", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Cluster(_)));
        assert_eq!(ns.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn create_errors_are_requeue_class() {
        let ns = RecordingNamespace {
            fail_create: true,
            ..Default::default()
        };
        let err = get_or_create_job(&ns, "b1", &json!({})).await.unwrap_err();
        assert!(matches!(err, Error::JobCreate { .. }));
        assert!(err.is_retryable());
    }
}
