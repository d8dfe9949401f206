//! Decision classification.
//!
//! The oracle answers in free text. Classification is a case-insensitive
//! substring match with fixed precedence: restart, then escalation, then
//! the raw text is taken as a merge patch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ClassifyError, ExecutionError, PipelineError};
use crate::manifest::SanitizedManifest;
use crate::oracle::ChatOracle;
use crate::prompt::{PromptContext, PromptRenderer, SYSTEM_PERSONA};

/// Marker meaning "delete the pod and let its controller recreate it".
pub const RESTART_MARKER: &str = "restart";

/// Marker meaning "a human has to look at this".
pub const ESCALATION_MARKER: &str = "[feishu]";

/// The closed set of remediation intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationDecision {
    Restart,
    /// Strategic merge patch document, as text
    Patch(String),
    /// Message for the escalation channel
    Escalate(String),
}

impl RemediationDecision {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::Restart => Action::Restart,
            Self::Patch(_) => Action::Patch,
            Self::Escalate(_) => Action::Escalate,
        }
    }

    /// Build a decision from an operator-chosen action name.
    pub fn from_action(action: &str, payload: Option<String>) -> Result<Self, ExecutionError> {
        match action.parse::<Action>()? {
            Action::Restart => Ok(Self::Restart),
            Action::Patch => Ok(Self::Patch(payload.unwrap_or_default())),
            Action::Escalate => Ok(Self::Escalate(payload.unwrap_or_default())),
        }
    }
}

/// Intent tag without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Restart,
    Patch,
    Escalate,
}

impl Action {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Patch => "patch",
            Self::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restart" => Ok(Self::Restart),
            "patch" => Ok(Self::Patch),
            "escalate" | "dangerous" => Ok(Self::Escalate),
            _ => Err(ExecutionError::UnknownAction(s.to_string())),
        }
    }
}

/// Classify a raw oracle response.
#[must_use]
pub fn classify(response: &str) -> RemediationDecision {
    let lowered = response.to_lowercase();
    if lowered.contains(RESTART_MARKER) {
        RemediationDecision::Restart
    } else if lowered.contains(ESCALATION_MARKER) {
        RemediationDecision::Escalate(lowered)
    } else {
        RemediationDecision::Patch(response.to_string())
    }
}

/// Asks the oracle what to do about one alert.
pub struct DecisionClassifier {
    oracle: Arc<dyn ChatOracle>,
    prompts: PromptRenderer,
}

impl DecisionClassifier {
    #[must_use]
    pub fn new(oracle: Arc<dyn ChatOracle>, prompts: PromptRenderer) -> Self {
        Self { oracle, prompts }
    }

    /// One exchange, one decision. No retries.
    pub async fn decide(
        &self,
        namespace: &str,
        manifest_yaml: &str,
        reason: &str,
    ) -> Result<RemediationDecision, ClassifyError> {
        let prompt = self.prompts.render(&PromptContext {
            namespace,
            reason,
            manifest: manifest_yaml,
        })?;

        let response = self.oracle.complete(SYSTEM_PERSONA, &prompt).await?;
        debug!(namespace, response = %response, "Oracle responded");

        let decision = classify(&response);
        info!(namespace, action = %decision.action(), "Classified oracle response");
        Ok(decision)
    }

    /// Convenience wrapper taking a sanitized manifest.
    pub async fn decide_for(
        &self,
        namespace: &str,
        manifest: &SanitizedManifest,
        reason: &str,
    ) -> Result<RemediationDecision, PipelineError> {
        let yaml = manifest.to_yaml()?;
        Ok(self.decide(namespace, &yaml, reason).await?)
    }
}
