//! Notification event types for remediation actions.

/// Events that can trigger notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    /// A problem needs a human. The message is delivered verbatim.
    Escalation {
        namespace: String,
        workload: String,
        message: String,
    },

    /// A merge patch was committed to a workload.
    PatchApplied { namespace: String, workload: String },
}

impl NotifyEvent {
    #[must_use]
    pub fn escalation(
        namespace: impl Into<String>,
        workload: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Escalation {
            namespace: namespace.into(),
            workload: workload.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn patch_applied(namespace: impl Into<String>, workload: impl Into<String>) -> Self {
        Self::PatchApplied {
            namespace: namespace.into(),
            workload: workload.into(),
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Escalation { .. } => "escalation",
            Self::PatchApplied { .. } => "patch_applied",
        }
    }

    /// Plain-text body sent to text-only channels.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Escalation { message, .. } => message.clone(),
            Self::PatchApplied {
                namespace,
                workload,
            } => format!(
                "Deployment {workload} in namespace {namespace} has been patched to fix an issue."
            ),
        }
    }
}
