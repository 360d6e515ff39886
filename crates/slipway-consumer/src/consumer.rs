//! Per-message orchestration: admission, submission, reporting, follow-up.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use slipway_core::{
    BuildRequest, ClusterConnection, ClusterConnector, DeploymentPatch, DeploymentStatus,
    Disposition, Error, EventLevel, EventSink, JobRecord, MonitorPayload, PlatformApi, Result,
    TaskDispatch,
};

use crate::admission::is_namespace_free;
use crate::jobs::get_or_create_job;

/// Queue task type of the follow-up watcher.
pub const MONITOR_TASK: &str = "build-monitor";

const START_EVENT: &str = "task:build-monitor:start";
const ERROR_EVENT: &str = "task:build-monitor:error";

/// Process-wide consumer context, constructed once at startup and handed to
/// the transport.
///
/// One instance serves one queue subscription and processes deliveries one
/// at a time. A transport running several workers gives each its own
/// instance; there is no shared in-process state between them, and namespace
/// occupancy is coordinated only through the cluster itself.
pub struct Consumer {
    platform: Arc<dyn PlatformApi>,
    clusters: Arc<dyn ClusterConnector>,
    tasks: Arc<dyn TaskDispatch>,
    events: Arc<dyn EventSink>,
}

impl Consumer {
    pub fn new(
        platform: Arc<dyn PlatformApi>,
        clusters: Arc<dyn ClusterConnector>,
        tasks: Arc<dyn TaskDispatch>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            platform,
            clusters,
            tasks,
            events,
        }
    }

    /// Handle one delivery. Every branch ends in an explicit disposition;
    /// the transport maps it onto ack, redeliver-later or drop.
    pub async fn process(&self, request: BuildRequest) -> Disposition {
        info!(
            project = %request.project_name,
            branch = %request.branch_name,
            sha = request.sha().unwrap_or(""),
            build = %request.build_name,
            "Received build deploy request"
        );

        match self.run(&request).await {
            Ok(job) => Disposition::Admitted { job },
            Err(reason) if reason.is_retryable() => {
                warn!(build = %request.build_name, %reason, "Requeueing build request");
                Disposition::Requeue { reason }
            }
            Err(error) => {
                error!(build = %request.build_name, %error, "Abandoning build request");
                Disposition::Abandon { error }
            }
        }
    }

    async fn run(&self, request: &BuildRequest) -> Result<JobRecord> {
        let cluster = self
            .platform
            .cluster_for_project(&request.project_name)
            .await?;
        let conn = ClusterConnection {
            endpoint: cluster.console_url,
            token: cluster.token,
            namespace: request.namespace.clone(),
        };
        let namespace = self.clusters.connect(&conn).await?;

        if !namespace.acquire_admission(&request.build_name).await? {
            return Err(Error::AdmissionBlocked {
                namespace: request.namespace.clone(),
                detail: "admission lease is held by another build".into(),
            });
        }

        let free = match is_namespace_free(namespace.as_ref()).await {
            Ok(free) => free,
            Err(e) => {
                namespace.release_admission(&request.build_name).await;
                return Err(e);
            }
        };
        if !free {
            namespace.release_admission(&request.build_name).await;
            return Err(Error::AdmissionBlocked {
                namespace: request.namespace.clone(),
                detail: "namespace has active build jobs".into(),
            });
        }

        let job =
            match get_or_create_job(namespace.as_ref(), &request.build_name, &request.job_config)
                .await
            {
                Ok(job) => job,
                Err(e) => {
                    namespace.release_admission(&request.build_name).await;
                    return Err(e);
                }
            };
        // The admission lease is left to expire from here on: the submitted
        // Job may not report an active pod immediately, and the listing
        // check cannot see it until it does.

        self.report_pending(request, &job).await;
        self.schedule_monitor(request, &job).await?;
        Ok(job)
    }

    /// Record the deployment as pending with the Job's cluster id. Best
    /// effort and at most once per delivery: the record store is a
    /// projection, the cluster Job is the source of truth.
    async fn report_pending(&self, request: &BuildRequest, job: &JobRecord) {
        let patch = DeploymentPatch {
            status: DeploymentStatus::Pending,
            remote_id: job.uid.clone(),
        };
        if let Err(e) = self
            .platform
            .update_deployment(request.deployment.id, &patch)
            .await
        {
            warn!(
                project = %request.project_name,
                build = %request.build_name,
                error = %e,
                "Could not update deployment record"
            );
        }
    }

    /// Enqueue the follow-up watcher and announce the build start.
    async fn schedule_monitor(&self, request: &BuildRequest, job: &JobRecord) -> Result<()> {
        let payload = MonitorPayload {
            build_name: job.name.clone(),
            project_name: request.project_name.clone(),
            namespace: request.namespace.clone(),
            branch_name: request.branch_name.clone(),
            sha: request.sha().map(String::from),
        };
        self.tasks.enqueue_monitor(MONITOR_TASK, &payload).await?;

        let reference = match request.sha() {
            Some(_) => deploy_ref(&request.branch_name, Some(&job.name)),
            None => deploy_ref(&request.branch_name, None),
        };
        self.events
            .emit(
                EventLevel::Start,
                &request.project_name,
                START_EVENT,
                json!({}),
                &format!("*[{}]* {}", request.project_name, reference),
            )
            .await;
        Ok(())
    }

    /// Terminal-failure reporting, invoked by the transport once its
    /// redelivery budget for a message is exhausted. Reporting only: no Job
    /// cleanup and no deployment-record rollback happen here.
    pub async fn handle_death(&self, payload: &[u8], last_error: &str) {
        let request = match BuildRequest::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Dead message does not decode as a build request");
                return;
            }
        };

        let sha = request.sha().map(short_sha);
        let reference = deploy_ref(&request.branch_name, sha);
        self.events
            .emit(
                EventLevel::Error,
                &request.project_name,
                ERROR_EVENT,
                json!({}),
                &format!(
                    "*[{}]* {} Build `{}` ERROR: ``` {} ```",
                    request.project_name, reference, request.build_name, last_error
                ),
            )
            .await;
    }
}

/// Human-readable deploy reference: `` `branch` (detail) `` with the detail
/// omitted when there is none.
fn deploy_ref(branch: &str, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("`{branch}` ({detail})"),
        None => format!("`{branch}`"),
    }
}

/// First seven characters of a commit sha.
fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}
