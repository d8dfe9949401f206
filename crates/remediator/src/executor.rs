//! Guarded execution of remediation decisions.
//!
//! Safety policy per intent:
//! - `Restart` deletes the pod; a pod that is already gone counts as done.
//! - `Escalate` only talks to the escalation channel.
//! - `Patch` is validate -> dry-run -> commit with the same parsed document.
//!   Nothing is committed unless the dry-run succeeded first.

use std::sync::Arc;
use std::time::Duration;

use notify::{NotifyChannel, NotifyEvent};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::cluster::ClusterOps;
use crate::decision::{Action, RemediationDecision};
use crate::error::{ClusterError, ExecutionError};

/// Default deadline for mutating calls.
pub const DEFAULT_MUTATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Where a decision is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionTarget {
    pub namespace: String,
    pub pod: String,
    pub workload: String,
}

/// What was done, with enough context to tell someone about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub namespace: String,
    pub workload: String,
    pub pod: String,
    pub action: Action,
    pub detail: String,
}

impl ExecutionOutcome {
    fn new(target: &ExecutionTarget, action: Action, detail: impl Into<String>) -> Self {
        Self {
            namespace: target.namespace.clone(),
            workload: target.workload.clone(),
            pod: target.pod.clone(),
            action,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Deadline for a pod delete, and for the dry-run plus commit of a patch
    pub mutation_timeout: Duration,
    /// Observe only: dry-run patches, never delete, never notify
    pub dry_run: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mutation_timeout: DEFAULT_MUTATION_TIMEOUT,
            dry_run: false,
        }
    }
}

pub struct GuardedExecutor {
    cluster: Arc<dyn ClusterOps>,
    escalation: Arc<dyn NotifyChannel>,
    confirmation: Arc<dyn NotifyChannel>,
    config: ExecutorConfig,
}

impl GuardedExecutor {
    /// `escalation` receives escalations and failure reports, `confirmation`
    /// receives patch confirmations. They may be the same channel.
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        escalation: Arc<dyn NotifyChannel>,
        confirmation: Arc<dyn NotifyChannel>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            cluster,
            escalation,
            confirmation,
            config,
        }
    }

    pub async fn execute(
        &self,
        decision: &RemediationDecision,
        target: &ExecutionTarget,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        match decision {
            RemediationDecision::Restart => self.restart(target).await,
            RemediationDecision::Escalate(message) => self.escalate(target, message).await,
            RemediationDecision::Patch(payload) => self.patch(target, payload).await,
        }
    }

    /// Parse an operator-supplied action name and execute it. Unknown names
    /// fail before anything is touched.
    pub async fn execute_named(
        &self,
        action: &str,
        payload: Option<String>,
        target: &ExecutionTarget,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let decision = RemediationDecision::from_action(action, payload)?;
        self.execute(&decision, target).await
    }

    /// Report a failed automated remediation to the escalation channel.
    pub async fn report_failure(
        &self,
        target: &ExecutionTarget,
        alertname: &str,
        error: &ExecutionError,
    ) -> Result<(), ExecutionError> {
        let text = format!(
            "[remediator] automated remediation of {alertname} failed for deployment {} (pod {}) in namespace {}: {error}",
            target.workload, target.pod, target.namespace
        );
        if self.config.dry_run {
            info!(
                namespace = %target.namespace,
                workload = %target.workload,
                text = %text,
                "Dry run: would escalate failure"
            );
            return Ok(());
        }
        let event = NotifyEvent::escalation(&target.namespace, &target.workload, text);
        self.deliver(self.escalation.as_ref(), &event).await
    }

    async fn restart(&self, target: &ExecutionTarget) -> Result<ExecutionOutcome, ExecutionError> {
        if self.config.dry_run {
            info!(namespace = %target.namespace, pod = %target.pod, "Dry run: would delete pod");
            return Ok(ExecutionOutcome::new(
                target,
                Action::Restart,
                "dry run, pod not deleted",
            ));
        }

        let deadline = Instant::now() + self.config.mutation_timeout;
        let result = timeout_at(
            deadline,
            self.cluster.delete_pod(&target.namespace, &target.pod),
        )
        .await
        .map_err(|_| self.timeout("pod delete"))?;

        let detail = match result {
            Ok(()) => "pod deleted",
            Err(e) if e.is_not_found() => "pod already gone",
            Err(e) => return Err(ExecutionError::Backend(e)),
        };

        info!(
            namespace = %target.namespace,
            pod = %target.pod,
            detail,
            "Deleted pod to trigger restart"
        );
        Ok(ExecutionOutcome::new(target, Action::Restart, detail))
    }

    async fn escalate(
        &self,
        target: &ExecutionTarget,
        text: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        if self.config.dry_run {
            info!(
                namespace = %target.namespace,
                workload = %target.workload,
                text,
                "Dry run: would escalate"
            );
            return Ok(ExecutionOutcome::new(
                target,
                Action::Escalate,
                "dry run, not sent",
            ));
        }

        let event = NotifyEvent::escalation(&target.namespace, &target.workload, text);
        self.deliver(self.escalation.as_ref(), &event).await?;

        info!(namespace = %target.namespace, workload = %target.workload, "Escalated to a human");
        Ok(ExecutionOutcome::new(
            target,
            Action::Escalate,
            "escalation sent",
        ))
    }

    async fn patch(
        &self,
        target: &ExecutionTarget,
        payload: &str,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let document = parse_patch(payload)?;
        let deadline = Instant::now() + self.config.mutation_timeout;

        timeout_at(
            deadline,
            self.cluster
                .patch_deployment(&target.namespace, &target.workload, &document, true),
        )
        .await
        .map_err(|_| self.timeout("dry-run patch"))?
        .map_err(|e| {
            warn!(
                namespace = %target.namespace,
                workload = %target.workload,
                error = %e,
                "Dry-run patch rejected"
            );
            ExecutionError::PatchRejected(e)
        })?;

        if self.config.dry_run {
            info!(
                namespace = %target.namespace,
                workload = %target.workload,
                "Dry run: patch validated, not committed"
            );
            return Ok(ExecutionOutcome::new(
                target,
                Action::Patch,
                "validated by dry-run, not committed",
            ));
        }

        timeout_at(
            deadline,
            self.cluster
                .patch_deployment(&target.namespace, &target.workload, &document, false),
        )
        .await
        .map_err(|_| self.timeout("patch"))?
        .map_err(ExecutionError::PatchRejected)?;

        info!(namespace = %target.namespace, workload = %target.workload, "Applied patch");

        let event = NotifyEvent::patch_applied(&target.namespace, &target.workload);
        self.deliver(self.confirmation.as_ref(), &event).await?;

        Ok(ExecutionOutcome::new(target, Action::Patch, "patch applied"))
    }

    async fn deliver(
        &self,
        channel: &dyn NotifyChannel,
        event: &NotifyEvent,
    ) -> Result<(), ExecutionError> {
        match channel.send(event).await {
            Ok(()) => {
                debug!(
                    channel = channel.name(),
                    kind = event.kind(),
                    "Notification delivered"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    channel = channel.name(),
                    kind = event.kind(),
                    error = %e,
                    "Notification delivery failed"
                );
                Err(ExecutionError::DeliveryFailure(e))
            }
        }
    }

    fn timeout(&self, operation: &'static str) -> ExecutionError {
        ExecutionError::Backend(ClusterError::Timeout {
            operation,
            secs: self.config.mutation_timeout.as_secs(),
        })
    }
}

/// Trim and parse a patch payload. It must be a non-empty JSON object.
pub fn parse_patch(payload: &str) -> Result<Value, ExecutionError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(ExecutionError::InvalidPatch("empty patch".to_string()));
    }
    let document: Value = serde_json::from_str(trimmed)
        .map_err(|e| ExecutionError::InvalidPatch(format!("patch is not valid JSON: {e}")))?;
    if !document.is_object() {
        return Err(ExecutionError::InvalidPatch(
            "patch must be a JSON object".to_string(),
        ));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterOps;
    use async_trait::async_trait;
    use notify::ChannelError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingChannel {
        sent: Mutex<Vec<NotifyEvent>>,
    }

    #[async_trait]
    impl NotifyChannel for CapturingChannel {
        fn name(&self) -> &'static str {
            "capture"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn target() -> ExecutionTarget {
        ExecutionTarget {
            namespace: "ns1".to_string(),
            pod: "p1".to_string(),
            workload: "dep1".to_string(),
        }
    }

    fn executor(
        cluster: MockClusterOps,
        dry_run: bool,
    ) -> (GuardedExecutor, Arc<CapturingChannel>) {
        let channel = Arc::new(CapturingChannel::default());
        let executor = GuardedExecutor::new(
            Arc::new(cluster),
            channel.clone(),
            channel.clone(),
            ExecutorConfig {
                dry_run,
                ..ExecutorConfig::default()
            },
        );
        (executor, channel)
    }

    fn rejected(raw: &str) -> bool {
        matches!(parse_patch(raw), Err(ExecutionError::InvalidPatch(_)))
    }

    #[test]
    fn test_parse_patch() {
        assert!(rejected("   "));
        assert!(rejected("spec: {}"));
        assert!(rejected("[1,2]"));
        assert_eq!(parse_patch("\n {\"a\":1} \n").unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_invalid_patch_never_contacts_cluster() {
        let mut cluster = MockClusterOps::new();
        cluster.expect_patch_deployment().times(0);
        let (executor, channel) = executor(cluster, false);

        let decision = RemediationDecision::Patch("increase memory".to_string());
        let err = executor.execute(&decision, &target()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidPatch(_)));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_rejection_skips_commit() {
        let mut cluster = MockClusterOps::new();
        cluster
            .expect_patch_deployment()
            .withf(|_, _, _, dry_run| *dry_run)
            .times(1)
            .returning(|_, _, _, _| {
                Err(ClusterError::Api {
                    code: 422,
                    message: "spec.template.spec.containers[0].image: Required value".to_string(),
                })
            });
        cluster
            .expect_patch_deployment()
            .withf(|_, _, _, dry_run| !*dry_run)
            .times(0);
        let (executor, channel) = executor(cluster, false);

        let decision = RemediationDecision::Patch(r#"{"spec":{}}"#.to_string());
        let err = executor.execute(&decision, &target()).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::PatchRejected(ClusterError::Api { code: 422, .. })
        ));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_ignores_not_found() {
        let mut cluster = MockClusterOps::new();
        cluster.expect_delete_pod().times(1).returning(|ns, name| {
            Err(ClusterError::NotFound {
                kind: "Pod",
                namespace: ns.to_string(),
                name: name.to_string(),
            })
        });
        let (executor, channel) = executor(cluster, false);

        let outcome = executor
            .execute(&RemediationDecision::Restart, &target())
            .await
            .unwrap();
        assert_eq!(outcome.action, Action::Restart);
        assert_eq!(outcome.detail, "pod already gone");
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_backend_error_is_reported() {
        let mut cluster = MockClusterOps::new();
        cluster.expect_delete_pod().returning(|_, _| {
            Err(ClusterError::Api {
                code: 403,
                message: "forbidden".to_string(),
            })
        });
        let (executor, _) = executor(cluster, false);

        let err = executor
            .execute(&RemediationDecision::Restart, &target())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExecutionError::Backend(ClusterError::Api { code: 403, .. })
        ));
        assert!(err.should_escalate());
    }

    #[tokio::test]
    async fn test_escalation_never_mutates() {
        let mut cluster = MockClusterOps::new();
        cluster.expect_delete_pod().times(0);
        cluster.expect_patch_deployment().times(0);
        let (executor, channel) = executor(cluster, false);

        let decision = RemediationDecision::Escalate("[feishu] db down".to_string());
        executor.execute(&decision, &target()).await.unwrap();
        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text(), "[feishu] db down");
    }

    #[tokio::test]
    async fn test_dry_run_mode_validates_without_committing() {
        let mut cluster = MockClusterOps::new();
        cluster
            .expect_patch_deployment()
            .withf(|_, _, _, dry_run| *dry_run)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        cluster
            .expect_patch_deployment()
            .withf(|_, _, _, dry_run| !*dry_run)
            .times(0);
        cluster.expect_delete_pod().times(0);
        let (executor, channel) = executor(cluster, true);

        let decision = RemediationDecision::Patch(r#"{"spec":{"replicas":3}}"#.to_string());
        executor.execute(&decision, &target()).await.unwrap();
        executor
            .execute(&RemediationDecision::Restart, &target())
            .await
            .unwrap();
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_named_action_has_no_side_effect() {
        let mut cluster = MockClusterOps::new();
        cluster.expect_delete_pod().times(0);
        cluster.expect_patch_deployment().times(0);
        let (executor, channel) = executor(cluster, false);

        let err = executor
            .execute_named("scale-up", None, &target())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnknownAction(_)));
        assert!(!err.should_escalate());
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_failure_names_workload() {
        let (executor, channel) = executor(MockClusterOps::new(), false);
        executor
            .report_failure(
                &target(),
                "PodCrashLooping",
                &ExecutionError::InvalidPatch("empty patch".to_string()),
            )
            .await
            .unwrap();
        let sent = channel.sent.lock().unwrap();
        let text = sent[0].text();
        assert!(text.contains("dep1"));
        assert!(text.contains("ns1"));
        assert!(text.contains("PodCrashLooping"));
    }
}
