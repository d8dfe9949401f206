//! Control loop.
//!
//! [`Agent::step`] runs one iteration (poll, then each watched alert through
//! resolve -> sanitize -> classify -> execute) and reports what happened.
//! [`Agent::run`] is the scheduler: step, sleep for [`Agent::delay_after`],
//! repeat. Each alert's pipeline is isolated; one failure never stops the
//! rest of the batch or the loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, AlertSource};
use crate::decision::DecisionClassifier;
use crate::error::{PipelineError, PollError};
use crate::executor::{ExecutionOutcome, ExecutionTarget, GuardedExecutor};
use crate::manifest::SanitizedManifest;
use crate::ownership::OwnershipResolver;

/// Alerts handled by default.
pub const DEFAULT_WATCHED_ALERTS: [&str; 3] = ["PodCrashLooping", "OOMKilled", "ImagePullBackOff"];

#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Sleep after a successful iteration
    pub poll_interval: Duration,
    /// Sleep after a failed poll
    pub backoff_interval: Duration,
    /// Alert names that enter the pipeline
    pub watched_alerts: Vec<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            backoff_interval: Duration::from_secs(60),
            watched_alerts: DEFAULT_WATCHED_ALERTS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl LoopConfig {
    #[must_use]
    pub fn watches(&self, alertname: &str) -> bool {
        self.watched_alerts.iter().any(|name| name == alertname)
    }
}

/// Result of one alert's pipeline.
#[derive(Debug)]
pub struct AlertReport {
    pub alertname: String,
    pub namespace: Option<String>,
    pub pod: Option<String>,
    pub disposition: AlertDisposition,
}

#[derive(Debug)]
pub enum AlertDisposition {
    /// Not on the watch list
    Ignored,
    Remediated(ExecutionOutcome),
    Failed(PipelineError),
}

impl AlertReport {
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        let base = json!({
            "alertname": self.alertname,
            "namespace": self.namespace,
            "pod": self.pod,
        });
        let detail = match &self.disposition {
            AlertDisposition::Ignored => json!({"status": "ignored"}),
            AlertDisposition::Remediated(outcome) => json!({
                "status": "remediated",
                "workload": outcome.workload,
                "action": outcome.action,
                "detail": outcome.detail,
            }),
            AlertDisposition::Failed(err) => json!({
                "status": "failed",
                "stage": err.stage(),
                "error": err.to_string(),
            }),
        };
        merge(base, detail)
    }
}

fn merge(mut base: serde_json::Value, extra: serde_json::Value) -> serde_json::Value {
    if let (Some(base_map), serde_json::Value::Object(extra_map)) = (base.as_object_mut(), extra) {
        base_map.extend(extra_map);
    }
    base
}

/// What one iteration did.
#[derive(Debug)]
pub enum StepReport {
    /// Poll failed; nothing was processed
    PollFailed(PollError),
    /// No firing alerts
    Idle,
    /// One report per firing alert, in poll order
    Processed(Vec<AlertReport>),
}

impl StepReport {
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        match self {
            Self::PollFailed(e) => json!({"status": "poll_failed", "error": e.to_string()}),
            Self::Idle => json!({"status": "idle", "alerts": []}),
            Self::Processed(reports) => json!({
                "status": "processed",
                "alerts": reports.iter().map(AlertReport::summary).collect::<Vec<_>>(),
            }),
        }
    }
}

/// The decide-and-act pipeline plus its scheduler.
pub struct Agent {
    source: Arc<dyn AlertSource>,
    resolver: OwnershipResolver,
    classifier: DecisionClassifier,
    executor: GuardedExecutor,
    config: LoopConfig,
}

impl Agent {
    #[must_use]
    pub fn new(
        source: Arc<dyn AlertSource>,
        resolver: OwnershipResolver,
        classifier: DecisionClassifier,
        executor: GuardedExecutor,
        config: LoopConfig,
    ) -> Self {
        Self {
            source,
            resolver,
            classifier,
            executor,
            config,
        }
    }

    /// Run forever. Only process termination stops it.
    pub async fn run(&self) {
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            backoff_secs = self.config.backoff_interval.as_secs(),
            watched = ?self.config.watched_alerts,
            "Starting remediation loop"
        );
        loop {
            let report = self.step().await;
            tokio::time::sleep(self.delay_after(&report)).await;
        }
    }

    /// How long to wait before the next iteration.
    #[must_use]
    pub fn delay_after(&self, report: &StepReport) -> Duration {
        match report {
            StepReport::PollFailed(_) => self.config.backoff_interval,
            StepReport::Idle | StepReport::Processed(_) => self.config.poll_interval,
        }
    }

    /// One iteration: poll, then process every alert in order.
    pub async fn step(&self) -> StepReport {
        info!("--- Remediation loop iteration start ---");

        let alerts = match self.source.firing_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                error!(error = %e, "Failed to poll alerts, backing off");
                return StepReport::PollFailed(e);
            }
        };

        if alerts.is_empty() {
            info!("No active alerts. System is healthy.");
            return StepReport::Idle;
        }

        info!(count = alerts.len(), "Found active alerts");
        let mut reports = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            reports.push(self.handle_alert(alert).await);
        }

        let failed = reports
            .iter()
            .filter(|r| matches!(r.disposition, AlertDisposition::Failed(_)))
            .count();
        info!(
            processed = reports.len(),
            failed,
            "--- Remediation loop iteration end ---"
        );
        StepReport::Processed(reports)
    }

    async fn handle_alert(&self, alert: &Alert) -> AlertReport {
        let alertname = alert.alertname().unwrap_or_default().to_string();
        let namespace = alert.namespace().map(str::to_string);
        let pod = alert.pod().map(str::to_string);

        let disposition = if self.config.watches(&alertname) {
            match self.remediate(&alertname, alert).await {
                Ok(outcome) => AlertDisposition::Remediated(outcome),
                Err(e) => {
                    warn!(
                        alertname = %alertname,
                        namespace = namespace.as_deref().unwrap_or_default(),
                        pod = pod.as_deref().unwrap_or_default(),
                        stage = e.stage(),
                        error = %e,
                        "Remediation failed for alert"
                    );
                    AlertDisposition::Failed(e)
                }
            }
        } else {
            debug!(alertname = %alertname, "Alert not watched, skipping");
            AlertDisposition::Ignored
        };

        AlertReport {
            alertname,
            namespace,
            pod,
            disposition,
        }
    }

    async fn remediate(
        &self,
        alertname: &str,
        alert: &Alert,
    ) -> Result<ExecutionOutcome, PipelineError> {
        let namespace = alert
            .namespace()
            .ok_or(PipelineError::MissingLabel("namespace"))?;
        let pod = alert.pod().ok_or(PipelineError::MissingLabel("pod"))?;
        info!(alertname, namespace, pod, "Handling alert");

        let resolved = self.resolver.resolve(namespace, pod).await?;
        let manifest = SanitizedManifest::from_resource(&resolved.deployment)?;

        let decision = self
            .classifier
            .decide_for(namespace, &manifest, alert.description())
            .await?;

        let target = ExecutionTarget {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            workload: resolved.workload_name().to_string(),
        };

        match self.executor.execute(&decision, &target).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if e.should_escalate() {
                    let reported = self.executor.report_failure(&target, alertname, &e).await;
                    if let Err(report_err) = reported {
                        error!(error = %report_err, "Failed to escalate remediation failure");
                    }
                }
                Err(e.into())
            }
        }
    }
}
