//! Ownership resolution: Pod -> ReplicaSet -> Deployment.

use std::sync::Arc;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde::Serialize;
use tracing::debug;

use crate::cluster::ClusterOps;
use crate::error::{ClusterError, ResolveError};

/// Kind of the object that directly owns pods.
pub const CONTROLLER_KIND: &str = "ReplicaSet";

/// Kind of the top-level workload that owns the controller.
pub const WORKLOAD_KIND: &str = "Deployment";

/// The walked chain, pod first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipChain {
    pub namespace: String,
    pub pod: String,
    pub replica_set: String,
    pub deployment: String,
}

/// A fully resolved chain plus the live top-level workload.
#[derive(Debug, Clone)]
pub struct ResolvedWorkload {
    pub chain: OwnershipChain,
    pub deployment: Deployment,
}

impl ResolvedWorkload {
    #[must_use]
    pub fn workload_name(&self) -> &str {
        &self.chain.deployment
    }
}

/// Walks exactly two ownership hops with one lookup each. No retries and no
/// caching: the topology may have changed since the last alert.
pub struct OwnershipResolver {
    cluster: Arc<dyn ClusterOps>,
}

impl OwnershipResolver {
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterOps>) -> Self {
        Self { cluster }
    }

    pub async fn resolve(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> Result<ResolvedWorkload, ResolveError> {
        let pod = self
            .cluster
            .get_pod(namespace, pod_name)
            .await
            .map_err(|e| match e {
                ClusterError::NotFound { .. } => ResolveError::NotFound {
                    namespace: namespace.to_string(),
                    pod: pod_name.to_string(),
                },
                other => ResolveError::Backend(other),
            })?;

        let pod_owners = pod.metadata.owner_references.as_deref();
        let replica_set_name = owner_named(pod_owners, CONTROLLER_KIND)
            .ok_or_else(|| ResolveError::NoOwner {
                child: format!("pod {namespace}/{pod_name}"),
                expected_kind: CONTROLLER_KIND,
            })?;
        debug!(
            namespace,
            pod = pod_name,
            replica_set = %replica_set_name,
            "Resolved pod owner"
        );

        let replica_set = self
            .cluster
            .get_replica_set(namespace, &replica_set_name)
            .await
            .map_err(ResolveError::Backend)?;

        let replica_set_owners = replica_set.metadata.owner_references.as_deref();
        let deployment_name = owner_named(replica_set_owners, WORKLOAD_KIND)
            .ok_or_else(|| ResolveError::NoOwner {
                child: format!("replicaset {namespace}/{replica_set_name}"),
                expected_kind: WORKLOAD_KIND,
            })?;
        debug!(
            namespace,
            replica_set = %replica_set_name,
            deployment = %deployment_name,
            "Resolved replicaset owner"
        );

        let deployment = self
            .cluster
            .get_deployment(namespace, &deployment_name)
            .await
            .map_err(ResolveError::Backend)?;

        Ok(ResolvedWorkload {
            chain: OwnershipChain {
                namespace: namespace.to_string(),
                pod: pod_name.to_string(),
                replica_set: replica_set_name,
                deployment: deployment_name,
            },
            deployment,
        })
    }
}

/// Name of the first owner reference of `kind`.
fn owner_named(refs: Option<&[OwnerReference]>, kind: &str) -> Option<String> {
    refs?
        .iter()
        .find(|owner| owner.kind == kind)
        .map(|owner| owner.name.clone())
}
