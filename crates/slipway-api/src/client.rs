//! HTTP client for the platform API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use slipway_core::{ClusterInfo, DeploymentPatch, Error, PlatformApi, Result};

/// Platform API connection settings.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: Url,
    pub token: String,
}

impl PlatformConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SLIPWAY_API_URL").ok()?.parse().ok()?;
        let token = std::env::var("SLIPWAY_API_TOKEN").ok()?;
        Some(Self { base_url, token })
    }
}

/// Platform API client.
pub struct PlatformClient {
    base: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectClusterResponse {
    console_url: String,
    #[serde(default)]
    token: Option<String>,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            base: config.base_url.as_str().trim_end_matches('/').to_string(),
            token: config.token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn cluster_for_project(&self, project: &str) -> Result<ClusterInfo> {
        let lookup_err = |message: String| Error::ProjectLookup {
            project: project.to_string(),
            message,
        };

        let url = format!("{}/projects/{}/cluster", self.base, project);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(lookup_err(format!("unexpected status {}", response.status())));
        }

        let body: ProjectClusterResponse = response
            .json()
            .await
            .map_err(|e| lookup_err(e.to_string()))?;

        let console_url = normalize_console_url(&body.console_url)
            .map_err(|e| lookup_err(format!("bad console url: {e}")))?;
        debug!(project, console = %console_url, "Resolved cluster for project");

        Ok(ClusterInfo {
            console_url,
            // Projects without a scoped token fall back to the empty token;
            // the cluster rejects it if it actually needed one.
            token: body.token.unwrap_or_default(),
        })
    }

    async fn update_deployment(&self, id: i64, patch: &DeploymentPatch) -> Result<()> {
        let url = format!("{}/deployments/{}", self.base, id);
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .json(patch)
            .send()
            .await
            .map_err(|e| Error::RecordUpdate(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::RecordUpdate(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Console URLs arrive with and without a trailing slash.
fn normalize_console_url(raw: &str) -> std::result::Result<Url, url::ParseError> {
    raw.trim_end_matches('/').parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_url_trailing_slash_is_trimmed() {
        let url = normalize_console_url("https://console.cluster.example:8443/").unwrap();
        assert_eq!(url.as_str(), "https://console.cluster.example:8443/");
        let bare = normalize_console_url("https://console.cluster.example:8443").unwrap();
        assert_eq!(url, bare);
    }

    #[test]
    fn cluster_response_token_defaults_to_empty() {
        let body: ProjectClusterResponse =
            serde_json::from_str(r#"{"consoleUrl": "https://c.example"}"#).unwrap();
        assert!(body.token.is_none());
        assert_eq!(body.console_url, "https://c.example");
    }
}
