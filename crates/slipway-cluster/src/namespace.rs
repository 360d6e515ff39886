//! Job operations over the build namespace of a connected cluster.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Config};
use secrecy::SecretString;
use tracing::{debug, info};

use slipway_core::{BuildNamespace, ClusterConnection, ClusterConnector, Error, JobRecord, Result};

use crate::admission::AdmissionLease;

/// Label selector identifying build Jobs, as stamped on their manifests by
/// the platform that assembles them.
pub const BUILD_JOB_SELECTOR: &str = "slipway.io/job-type=build";

/// Admission lease TTL; long enough to cover the admission check, the Job
/// create call and the wait until the created Job reports an active pod.
pub const DEFAULT_ADMISSION_TTL_SECONDS: i32 = 60;

/// One namespace on one build cluster, reached through per-request
/// credentials.
pub struct ClusterNamespace {
    jobs: Api<Job>,
    admission: AdmissionLease,
    namespace: String,
}

impl ClusterNamespace {
    /// Build a client from resolved connection details. The control planes
    /// behind the platform's console URLs present self-signed certificates,
    /// so verification is off, matching the rest of the deploy tooling.
    pub fn from_connection(conn: &ClusterConnection, admission_ttl_seconds: i32) -> Result<Self> {
        let uri = conn
            .endpoint
            .as_str()
            .parse::<http::Uri>()
            .map_err(|e| Error::Cluster(format!("invalid cluster endpoint: {e}")))?;
        let mut config = Config::new(uri);
        config.default_namespace = conn.namespace.clone();
        config.accept_invalid_certs = true;
        config.auth_info.token = Some(SecretString::from(conn.token.clone()));
        let client = Client::try_from(config).map_err(cluster_err)?;

        Ok(Self {
            jobs: Api::namespaced(client.clone(), &conn.namespace),
            admission: AdmissionLease::new(client, &conn.namespace, admission_ttl_seconds),
            namespace: conn.namespace.clone(),
        })
    }
}

#[async_trait]
impl BuildNamespace for ClusterNamespace {
    async fn active_builds(&self) -> Result<usize> {
        let params = ListParams::default().labels(BUILD_JOB_SELECTOR);
        let jobs = self.jobs.list(&params).await.map_err(cluster_err)?;
        Ok(count_active(&jobs.items))
    }

    async fn get_job(&self, name: &str) -> Result<Option<JobRecord>> {
        match self.jobs.get_opt(name).await.map_err(cluster_err)? {
            Some(job) => Ok(Some(job_record(&job)?)),
            None => Ok(None),
        }
    }

    async fn create_job(&self, name: &str, manifest: &serde_json::Value) -> Result<JobRecord> {
        let job: Job = serde_json::from_value(manifest.clone()).map_err(|e| Error::JobCreate {
            name: name.to_string(),
            message: format!("manifest does not describe a Job: {e}"),
        })?;
        debug!(namespace = %self.namespace, job = name, "Submitting job manifest");

        match self.jobs.create(&PostParams::default(), &job).await {
            Ok(created) => {
                info!(namespace = %self.namespace, job = name, "Created build job");
                job_record(&created)
            }
            // Lost a create race to a concurrent delivery; the Job that won
            // is this build.
            Err(e) if is_api_code(&e, 409) => {
                let existing = self.jobs.get(name).await.map_err(cluster_err)?;
                job_record(&existing)
            }
            Err(e) => Err(Error::JobCreate {
                name: name.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn acquire_admission(&self, holder: &str) -> Result<bool> {
        self.admission.try_acquire(holder).await
    }

    async fn release_admission(&self, holder: &str) {
        self.admission.release(holder).await;
    }
}

/// Connector handed to the consumer at startup; builds one client per
/// message from the connection details resolved for that message.
pub struct KubeConnector {
    admission_ttl_seconds: i32,
}

impl KubeConnector {
    pub fn new(admission_ttl_seconds: i32) -> Self {
        Self {
            admission_ttl_seconds,
        }
    }
}

impl Default for KubeConnector {
    fn default() -> Self {
        Self::new(DEFAULT_ADMISSION_TTL_SECONDS)
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    async fn connect(&self, conn: &ClusterConnection) -> Result<Box<dyn BuildNamespace>> {
        Ok(Box::new(ClusterNamespace::from_connection(
            conn,
            self.admission_ttl_seconds,
        )?))
    }
}

fn cluster_err(err: kube::Error) -> Error {
    Error::Cluster(err.to_string())
}

fn is_api_code(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == code)
}

fn job_record(job: &Job) -> Result<JobRecord> {
    let name = job.metadata.name.clone().unwrap_or_default();
    let uid = job
        .metadata
        .uid
        .clone()
        .ok_or_else(|| Error::Cluster(format!("job {name} has no uid")))?;
    Ok(JobRecord {
        name,
        uid,
        active: job.status.as_ref().and_then(|s| s.active).unwrap_or(0),
        labels: job.metadata.labels.clone().unwrap_or_default(),
    })
}

fn count_active(jobs: &[Job]) -> usize {
    jobs.iter()
        .filter(|job| job.status.as_ref().and_then(|s| s.active).unwrap_or(0) > 0)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::JobStatus;
    use kube::api::ObjectMeta;

    fn job(name: &str, uid: Option<&str>, active: Option<i32>) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                uid: uid.map(String::from),
                ..ObjectMeta::default()
            },
            spec: None,
            status: Some(JobStatus {
                active,
                ..JobStatus::default()
            }),
        }
    }

    #[test]
    fn counts_only_jobs_with_active_pods() {
        let jobs = vec![
            job("done", Some("u1"), Some(0)),
            job("running", Some("u2"), Some(1)),
            job("unstarted", Some("u3"), None),
        ];
        assert_eq!(count_active(&jobs), 1);
    }

    #[test]
    fn record_projects_metadata_and_status() {
        let record = job_record(&job("b1", Some("u1"), Some(2))).unwrap();
        assert_eq!(record.name, "b1");
        assert_eq!(record.uid, "u1");
        assert_eq!(record.active, 2);
    }

    #[test]
    fn record_requires_a_server_assigned_uid() {
        let err = job_record(&job("b1", None, None)).unwrap_err();
        assert!(matches!(err, Error::Cluster(_)));
    }
}
