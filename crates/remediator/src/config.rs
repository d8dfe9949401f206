//! Runtime configuration.
//!
//! Every option is a CLI flag with an environment variable fallback. Flags
//! are global so they may follow the subcommand.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use thiserror::Error;

use crate::agent::LoopConfig;
use crate::alert::{PrometheusConfig, DEFAULT_PROMETHEUS_URL};
use crate::executor::ExecutorConfig;
use crate::oracle::{OracleConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("watched alert list is empty")]
    EmptyWatchList,

    #[error("an oracle API key is required (--oracle-api-key or ORACLE_API_KEY)")]
    MissingApiKey,
}

#[derive(Debug, Clone, Args)]
pub struct AgentConfig {
    /// Prometheus base URL
    #[arg(long, global = true, env = "PROMETHEUS_URL", default_value = DEFAULT_PROMETHEUS_URL)]
    pub prometheus_url: String,

    /// Seconds between iterations
    #[arg(long, global = true, env = "POLL_INTERVAL_SECS", default_value_t = 30)]
    pub poll_interval_secs: u64,

    /// Seconds to wait after a failed poll
    #[arg(long, global = true, env = "BACKOFF_INTERVAL_SECS", default_value_t = 60)]
    pub backoff_interval_secs: u64,

    /// Alert names to remediate (comma separated)
    #[arg(
        long,
        global = true,
        env = "WATCHED_ALERTS",
        value_delimiter = ',',
        default_values = ["PodCrashLooping", "OOMKilled", "ImagePullBackOff"]
    )]
    pub watched_alerts: Vec<String>,

    /// OpenAI-compatible base URL
    #[arg(long, global = true, env = "ORACLE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub oracle_url: String,

    /// Chat model name
    #[arg(long, global = true, env = "ORACLE_MODEL", default_value = DEFAULT_MODEL)]
    pub oracle_model: String,

    /// Bearer credential for the oracle
    #[arg(long, global = true, env = "ORACLE_API_KEY", hide_env_values = true)]
    pub oracle_api_key: Option<String>,

    /// Oracle request timeout in seconds
    #[arg(long, global = true, env = "ORACLE_TIMEOUT_SECS", default_value_t = 120)]
    pub oracle_timeout_secs: u64,

    /// Webhook for escalations and failure reports
    #[arg(long, global = true, env = "ESCALATION_WEBHOOK_URL")]
    pub escalation_webhook: Option<String>,

    /// Webhook for patch confirmations (defaults to the escalation webhook)
    #[arg(long, global = true, env = "PATCH_WEBHOOK_URL")]
    pub patch_webhook: Option<String>,

    /// Deadline for mutating cluster calls
    #[arg(long, global = true, env = "PATCH_TIMEOUT_SECS", default_value_t = 20)]
    pub patch_timeout_secs: u64,

    /// Handlebars template replacing the built-in prompt
    #[arg(long, global = true, env = "PROMPT_TEMPLATE")]
    pub prompt_template: Option<PathBuf>,

    /// A single kubeconfig file. When unset: in-cluster config, then the
    /// standard lookup, which reads `KUBECONFIG` itself.
    #[arg(long, global = true, env = "REMEDIATOR_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Observe only: dry-run patches, never delete, never notify
    #[arg(
        long,
        global = true,
        env = "REMEDIATOR_DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("poll interval"));
        }
        if self.backoff_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval("backoff interval"));
        }
        if self.patch_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval("patch timeout"));
        }
        if self.watched_alerts.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::EmptyWatchList);
        }
        Ok(())
    }

    #[must_use]
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            backoff_interval: Duration::from_secs(self.backoff_interval_secs),
            watched_alerts: self
                .watched_alerts
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn prometheus_config(&self) -> PrometheusConfig {
        PrometheusConfig {
            base_url: self.prometheus_url.clone(),
            ..PrometheusConfig::default()
        }
    }

    pub fn oracle_config(&self) -> Result<OracleConfig, ConfigError> {
        let api_key = self
            .oracle_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(OracleConfig {
            base_url: self.oracle_url.clone(),
            model: self.oracle_model.clone(),
            api_key,
            timeout_secs: self.oracle_timeout_secs,
        })
    }

    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            mutation_timeout: Duration::from_secs(self.patch_timeout_secs),
            dry_run: self.dry_run,
        }
    }

    /// Patch confirmations fall back to the escalation webhook.
    #[must_use]
    pub fn patch_webhook(&self) -> Option<String> {
        self.patch_webhook
            .clone()
            .or_else(|| self.escalation_webhook.clone())
    }
}
