//! Prometheus alert poller.
//!
//! Reads `GET {base}/api/v1/alerts` and keeps only firing alerts, in the
//! order Prometheus returned them. No retries here; the control loop owns
//! backoff.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PollError;

/// Default Prometheus service URL (internal Kubernetes DNS)
pub const DEFAULT_PROMETHEUS_URL: &str =
    "http://prometheus-server.observability.svc.cluster.local:80";

/// The only actionable alert state.
pub const FIRING: &str = "firing";

/// One alert as reported by Prometheus. Read once, used for one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub state: String,
    #[serde(default)]
    pub active_at: Option<DateTime<Utc>>,
}

impl Alert {
    #[must_use]
    pub fn is_firing(&self) -> bool {
        self.state == FIRING
    }

    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn alertname(&self) -> Option<&str> {
        self.label("alertname")
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.label("namespace")
    }

    #[must_use]
    pub fn pod(&self) -> Option<&str> {
        self.label("pod")
    }

    /// The `description` annotation, or empty.
    #[must_use]
    pub fn description(&self) -> &str {
        self.annotations
            .get("description")
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Anything that can list currently firing alerts.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn firing_alerts(&self) -> Result<Vec<Alert>, PollError>;
}

/// Configuration for the Prometheus client
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Base URL for the Prometheus API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROMETHEUS_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    status: String,
    data: AlertsData,
}

#[derive(Debug, Deserialize)]
struct AlertsData {
    #[serde(default)]
    alerts: Vec<Alert>,
}

/// Prometheus client for the alerts endpoint
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    config: PrometheusConfig,
    client: reqwest::Client,
}

impl PrometheusClient {
    pub fn new(config: PrometheusConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn alerts_url(&self) -> String {
        format!(
            "{}/api/v1/alerts",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AlertSource for PrometheusClient {
    async fn firing_alerts(&self) -> Result<Vec<Alert>, PollError> {
        let url = self.alerts_url();
        debug!(url = %url, "Querying Prometheus alerts");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::SourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::SourceUnavailable(format!(
                "Prometheus returned {status}: {body}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PollError::SourceUnavailable(e.to_string()))?;

        let parsed: AlertsResponse = serde_json::from_str(&body)
            .map_err(|e| PollError::MalformedResponse(e.to_string()))?;

        if parsed.status != "success" {
            return Err(PollError::MalformedResponse(format!(
                "Prometheus returned status: {}",
                parsed.status
            )));
        }

        let total = parsed.data.alerts.len();
        let firing: Vec<Alert> = parsed
            .data
            .alerts
            .into_iter()
            .filter(Alert::is_firing)
            .collect();
        debug!(total, firing = firing.len(), "Fetched alerts");

        Ok(firing)
    }
}
