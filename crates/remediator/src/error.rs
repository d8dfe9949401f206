//! Error taxonomy for the remediation pipeline.
//!
//! One enum per stage. [`PipelineError`] wraps them for the per-alert
//! result that the control loop aggregates.

use thiserror::Error;

/// Alert source failures. Abort the current iteration only.
#[derive(Debug, Error)]
pub enum PollError {
    /// Transport failure or non-success HTTP status
    #[error("alert source unavailable: {0}")]
    SourceUnavailable(String),

    /// Body could not be decoded into the alert envelope
    #[error("malformed alert response: {0}")]
    MalformedResponse(String),
}

/// Failures reported by the cluster capability.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// API server rejected the request
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    /// API server could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// Call did not finish before its deadline
    #[error("{operation} exceeded the {secs}s deadline")]
    Timeout { operation: &'static str, secs: u64 },
}

impl ClusterError {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Ownership resolution failures.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The pod itself does not exist
    #[error("pod {namespace}/{pod} not found")]
    NotFound { namespace: String, pod: String },

    /// A hop in the chain has no owner reference of the expected kind
    #[error("{child} has no {expected_kind} owner")]
    NoOwner {
        child: String,
        expected_kind: &'static str,
    },

    /// A read call failed
    #[error("backend error during ownership resolution: {0}")]
    Backend(#[source] ClusterError),
}

/// Chat oracle failures.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The exchange itself failed (transport, auth, bad status, decode)
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle answered with no choices
    #[error("oracle returned no choices")]
    EmptyResponse,
}

/// Decision classification failures.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] handlebars::RenderError),
}

/// Guarded executor failures.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Payload is empty or not well-formed JSON; the cluster was not contacted
    #[error("invalid patch payload: {0}")]
    InvalidPatch(String),

    /// The dry-run (or the commit) was refused
    #[error("patch rejected by the API server: {0}")]
    PatchRejected(#[source] ClusterError),

    /// A mutating call failed
    #[error("backend error: {0}")]
    Backend(#[source] ClusterError),

    /// Action name is not one of restart, patch, escalate
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Notification sink did not accept the message
    #[error("notification delivery failed: {0}")]
    DeliveryFailure(#[from] notify::ChannelError),
}

impl ExecutionError {
    /// Failures worth a human's attention. A broken sink cannot be escalated
    /// through itself.
    pub const fn should_escalate(&self) -> bool {
        !matches!(self, Self::DeliveryFailure(_) | Self::UnknownAction(_))
    }
}

/// Everything that can stop one alert's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Alert lacks a label the pipeline needs
    #[error("alert is missing the `{0}` label")]
    MissingLabel(&'static str),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("could not serialize workload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not render workload manifest: {0}")]
    Manifest(#[from] serde_yaml::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Execute(#[from] ExecutionError),
}

impl PipelineError {
    /// Stage name used in logs and summaries.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::MissingLabel(_) => "intake",
            Self::Resolve(_) | Self::Serialize(_) | Self::Manifest(_) => "resolve",
            Self::Classify(_) => "classify",
            Self::Execute(_) => "execute",
        }
    }
}
