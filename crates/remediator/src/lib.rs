//! Closed-loop remediation agent.
//!
//! Polls Prometheus for firing alerts, walks each affected pod up to its
//! Deployment, asks a chat oracle what to do, and applies the answer with
//! safety gates:
//!
//! ```text
//! alert poller -> ownership resolver -> manifest sanitizer
//!              -> decision classifier -> guarded executor -> notification
//! ```
//!
//! The cluster, alert source, oracle, and notification channels are all
//! traits passed in explicitly, so the whole pipeline runs against fakes in
//! tests.

pub mod agent;
pub mod alert;
pub mod cluster;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod oracle;
pub mod ownership;
pub mod prompt;

pub use agent::{Agent, AlertDisposition, AlertReport, LoopConfig, StepReport};
pub use alert::{Alert, AlertSource, PrometheusClient, PrometheusConfig};
pub use cluster::{ClusterOps, KubeCluster};
pub use config::AgentConfig;
pub use decision::{classify, Action, DecisionClassifier, RemediationDecision};
pub use error::{
    ClassifyError, ClusterError, ExecutionError, OracleError, PipelineError, PollError,
    ResolveError,
};
pub use executor::{ExecutionOutcome, ExecutionTarget, ExecutorConfig, GuardedExecutor};
pub use manifest::{sanitize, SanitizedManifest};
pub use oracle::{ChatOracle, OpenAiOracle, OracleConfig};
pub use ownership::{OwnershipChain, OwnershipResolver, ResolvedWorkload};
pub use prompt::PromptRenderer;
