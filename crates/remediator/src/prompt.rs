//! Prompt rendering for the decision oracle using Handlebars.

use std::path::Path;

use anyhow::{Context, Result};
use handlebars::{Handlebars, RenderError, TemplateError};
use serde::Serialize;

/// System turn sent with every request.
pub const SYSTEM_PERSONA: &str = "You are a Kubernetes expert helping resolve cluster problems.";

const TEMPLATE_NAME: &str = "remediation";

/// Built-in instruction template.
pub const DEFAULT_TEMPLATE: &str = r#"You are a cloud-native expert responsible for analysing errors in a Kubernetes Pod/Deployment and producing a fix that can be applied directly. Follow these rules strictly:
1. If restarting the Pod will resolve the problem, output only: restart
2. If changing the Deployment will resolve the problem, output only a JSON document usable with `kubectl patch`. No explanation, no extra words, no code fences.
3. If the problem is serious and needs a human (for example a database connection error or HTTP 500 errors), explain the cause together with the namespace, the deployment and the error details, and include the marker [feishu] in your output.

Namespace: {{namespace}}

Kubernetes error:
{{reason}}

Deployment YAML:
{{manifest}}
"#;

/// Values available to the template.
#[derive(Debug, Serialize)]
pub struct PromptContext<'a> {
    pub namespace: &'a str,
    /// Alert description text
    pub reason: &'a str,
    /// Sanitized workload YAML
    pub manifest: &'a str,
}

/// Renders the user turn of the decision exchange.
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Renderer using [`DEFAULT_TEMPLATE`].
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::from_template(DEFAULT_TEMPLATE)
    }

    pub fn from_template(template: &str) -> Result<Self, TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text; HTML escaping would mangle YAML and quotes.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_template_string(TEMPLATE_NAME, template)?;
        Ok(Self { handlebars })
    }

    /// Load a custom template from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))?;
        Self::from_template(&template)
            .with_context(|| format!("Failed to parse prompt template: {}", path.display()))
    }

    pub fn render(&self, context: &PromptContext<'_>) -> Result<String, RenderError> {
        self.handlebars.render(TEMPLATE_NAME, context)
    }
}
