//! Cluster capability.
//!
//! Every component receives the cluster as an `Arc<dyn ClusterOps>` so tests
//! can substitute an in-memory fake. [`KubeCluster`] is the real thing.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ClusterError;

/// Read, delete, and patch access to the workload objects the agent touches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterOps: Send + Sync {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError>;

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReplicaSet, ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Strategic merge patch. With `dry_run` the API server validates and
    /// admits the change without persisting it.
    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        dry_run: bool,
    ) -> Result<(), ClusterError>;
}

/// [`ClusterOps`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client: an explicit kubeconfig file wins, otherwise in-cluster
    /// configuration, otherwise the usual local lookup (which honours a
    /// colon-separated `KUBECONFIG`).
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Failed to load kubeconfig")?
            }
            None => match Config::incluster() {
                Ok(config) => {
                    info!("Using in-cluster configuration");
                    config
                }
                Err(e) => {
                    debug!(error = %e, "Not running in-cluster, falling back to kubeconfig");
                    Config::infer()
                        .await
                        .context("Failed to infer Kubernetes configuration")?
                }
            },
        };

        let client = Client::try_from(config).context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

fn map_kube_error(
    kind: &'static str,
    namespace: &str,
    name: &str,
    err: kube::Error,
) -> ClusterError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) => ClusterError::Api {
            code: ae.code,
            message: ae.message,
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.get(name)
            .await
            .map_err(|e| map_kube_error("Pod", namespace, name, e))
    }

    async fn get_replica_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReplicaSet, ClusterError> {
        let replica_sets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        replica_sets
            .get(name)
            .await
            .map_err(|e| map_kube_error("ReplicaSet", namespace, name, e))
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, ClusterError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        deployments
            .get(name)
            .await
            .map_err(|e| map_kube_error("Deployment", namespace, name, e))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error("Pod", namespace, name, e))
    }

    async fn patch_deployment(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
        dry_run: bool,
    ) -> Result<(), ClusterError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams {
            dry_run,
            ..PatchParams::default()
        };
        deployments
            .patch(name, &params, &Patch::Strategic(patch))
            .await
            .map(|_| ())
            .map_err(|e| map_kube_error("Deployment", namespace, name, e))
    }
}
