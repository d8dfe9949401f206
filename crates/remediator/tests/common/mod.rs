//! In-memory stand-ins for the cluster, alert source, oracle, and channels.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use notify::{ChannelError, NotifyChannel, NotifyEvent};
use remediator::{
    Agent, Alert, AlertSource, ChatOracle, ClusterError, ClusterOps, DecisionClassifier,
    ExecutorConfig, GuardedExecutor, LoopConfig, OracleError, OwnershipResolver, PollError,
    PromptRenderer,
};
use serde_json::Value;

// =============================================================================
// Cluster
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PatchCall {
    pub namespace: String,
    pub name: String,
    pub patch: Value,
    pub dry_run: bool,
}

#[derive(Default)]
pub struct FakeCluster {
    pods: Mutex<HashMap<(String, String), Pod>>,
    replica_sets: Mutex<HashMap<(String, String), ReplicaSet>>,
    deployments: Mutex<HashMap<(String, String), Deployment>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub patches: Mutex<Vec<PatchCall>>,
    pub dry_run_error: Mutex<Option<ClusterError>>,
    pub patch_delay: Mutex<Option<Duration>>,
    pub lookups: Mutex<usize>,
}

fn meta(namespace: &str, name: &str, owner: Option<(&str, &str)>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("uid-{name}")),
        resource_version: Some("100".to_string()),
        owner_references: owner.map(|(kind, owner_name)| {
            vec![OwnerReference {
                api_version: "apps/v1".to_string(),
                kind: kind.to_string(),
                name: owner_name.to_string(),
                uid: format!("uid-{owner_name}"),
                controller: Some(true),
                ..OwnerReference::default()
            }]
        }),
        ..ObjectMeta::default()
    }
}

impl FakeCluster {
    /// Pod -> ReplicaSet `<deployment>-5d8f` -> Deployment.
    pub fn with_chain(self, namespace: &str, pod: &str, deployment: &str) -> Self {
        let rs = format!("{deployment}-5d8f");
        self.pods.lock().unwrap().insert(
            (namespace.to_string(), pod.to_string()),
            Pod {
                metadata: meta(namespace, pod, Some(("ReplicaSet", &rs))),
                ..Pod::default()
            },
        );
        self.replica_sets.lock().unwrap().insert(
            (namespace.to_string(), rs.clone()),
            ReplicaSet {
                metadata: meta(namespace, &rs, Some(("Deployment", deployment))),
                ..ReplicaSet::default()
            },
        );
        self.deployments.lock().unwrap().insert(
            (namespace.to_string(), deployment.to_string()),
            serde_json::from_value(serde_json::json!({
                "metadata": {
                    "name": deployment,
                    "namespace": namespace,
                    "uid": "dep-uid",
                    "resourceVersion": "42",
                    "generation": 7,
                    "annotations": {"deployment.kubernetes.io/revision": "7"}
                },
                "spec": {
                    "selector": {"matchLabels": {"app": deployment}},
                    "template": {
                        "metadata": {"labels": {"app": deployment}},
                        "spec": {"containers": [{"name": "c", "image": "v1"}]}
                    }
                },
                "status": {"replicas": 1, "unavailableReplicas": 1}
            }))
            .unwrap(),
        );
        self
    }

    /// A pod owned by something other than a ReplicaSet.
    pub fn with_orphan_pod(self, namespace: &str, pod: &str) -> Self {
        self.pods.lock().unwrap().insert(
            (namespace.to_string(), pod.to_string()),
            Pod {
                metadata: meta(namespace, pod, Some(("StatefulSet", "db"))),
                ..Pod::default()
            },
        );
        self
    }

    pub fn reject_dry_run(self, error: ClusterError) -> Self {
        *self.dry_run_error.lock().unwrap() = Some(error);
        self
    }

    pub fn slow_patches(self, delay: Duration) -> Self {
        *self.patch_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn trial_patches(&self) -> Vec<PatchCall> {
        self.patches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.dry_run)
            .cloned()
            .collect()
    }

    pub fn committed_patches(&self) -> Vec<PatchCall> {
        self.patches
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !p.dry_run)
            .cloned()
            .collect()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }

    fn not_found(kind: &'static str, namespace: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ClusterOps for FakeCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        *self.lookups.lock().unwrap() += 1;
        self.pods
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("Pod", namespace, name))
    }

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReplicaSet, ClusterError> {
        *self.lookups.lock().unwrap() += 1;
        self.replica_sets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("ReplicaSet", namespace, name))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, ClusterError> {
        *self.lookups.lock().unwrap() += 1;
        self.deployments
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Self::not_found("Deployment", namespace, name))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deleted
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        let removed = self
            .pods
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        match removed {
            Some(_) => Ok(()),
            None => Err(Self::not_found("Pod", namespace, name)),
        }
    }

    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        dry_run: bool,
    ) -> Result<(), ClusterError> {
        let delay = *self.patch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.patches.lock().unwrap().push(PatchCall {
            namespace: namespace.to_string(),
            name: name.to_string(),
            patch: patch.clone(),
            dry_run,
        });
        if dry_run {
            if let Some(error) = self.dry_run_error.lock().unwrap().take() {
                return Err(error);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Alert source
// =============================================================================

/// Returns queued poll results in order, then empty lists.
#[derive(Default)]
pub struct QueuedAlerts {
    queue: Mutex<VecDeque<Result<Vec<Alert>, PollError>>>,
}

impl QueuedAlerts {
    pub fn push(&self, result: Result<Vec<Alert>, PollError>) {
        self.queue.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl AlertSource for QueuedAlerts {
    async fn firing_alerts(&self) -> Result<Vec<Alert>, PollError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn alert(alertname: &str, namespace: &str, pod: &str, description: &str) -> Alert {
    serde_json::from_value(serde_json::json!({
        "labels": {
            "alertname": alertname,
            "namespace": namespace,
            "pod": pod,
            "severity": "critical"
        },
        "annotations": {"description": description},
        "state": "firing",
        "activeAt": "2024-05-01T10:00:00Z"
    }))
    .unwrap()
}

// =============================================================================
// Oracle
// =============================================================================

/// Replies keyed by a substring of the user prompt; falls back to `default`.
pub struct ScriptedOracle {
    replies: Vec<(String, Result<String, ()>)>,
    default: Result<String, ()>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn always(reply: &str) -> Self {
        Self {
            replies: Vec::new(),
            default: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn when(mut self, prompt_contains: &str, reply: Result<&str, ()>) -> Self {
        self.replies
            .push((prompt_contains.to_string(), reply.map(str::to_string)));
        self
    }
}

#[async_trait]
impl ChatOracle for ScriptedOracle {
    async fn complete(&self, _system: &str, user: &str) -> Result<String, OracleError> {
        self.prompts.lock().unwrap().push(user.to_string());
        let reply = self
            .replies
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default.clone());
        reply.map_err(|()| OracleError::Unavailable("reset".to_string()))
    }
}

// =============================================================================
// Notification channels
// =============================================================================

#[derive(Default)]
pub struct CapturingChannel {
    pub sent: Mutex<Vec<NotifyEvent>>,
    pub fail: bool,
}

impl CapturingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(NotifyEvent::text)
            .collect()
    }
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
        if self.fail {
            Err(ChannelError::Status {
                status: 500,
                body: "boom".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// Wiring
// =============================================================================

pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub source: Arc<QueuedAlerts>,
    pub oracle: Arc<ScriptedOracle>,
    pub escalation: Arc<CapturingChannel>,
    pub confirmation: Arc<CapturingChannel>,
    pub agent: Agent,
}

pub fn harness(cluster: FakeCluster, oracle: ScriptedOracle) -> Harness {
    harness_with(cluster, oracle, ExecutorConfig::default())
}

pub fn harness_with(
    cluster: FakeCluster,
    oracle: ScriptedOracle,
    config: ExecutorConfig,
) -> Harness {
    let cluster = Arc::new(cluster);
    let source = Arc::new(QueuedAlerts::default());
    let oracle = Arc::new(oracle);
    let escalation = Arc::new(CapturingChannel::default());
    let confirmation = Arc::new(CapturingChannel::default());

    let agent = Agent::new(
        source.clone(),
        OwnershipResolver::new(cluster.clone()),
        DecisionClassifier::new(oracle.clone(), PromptRenderer::builtin().unwrap()),
        GuardedExecutor::new(
            cluster.clone(),
            escalation.clone(),
            confirmation.clone(),
            config,
        ),
        LoopConfig::default(),
    );

    Harness {
        cluster,
        source,
        oracle,
        escalation,
        confirmation,
        agent,
    }
}
