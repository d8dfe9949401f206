//! Remediator CLI
//!
//! Runs the remediation loop, a single iteration, or one-off inspection and
//! execution against a pod.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify::{FeishuChannel, NotifyChannel};
use remediator::{
    Agent, AgentConfig, ClusterOps, DecisionClassifier, ExecutionTarget, GuardedExecutor,
    KubeCluster, OpenAiOracle, OwnershipResolver, PrometheusClient, PromptRenderer,
    SanitizedManifest,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Closed-loop remediation agent for Kubernetes workloads
#[derive(Parser)]
#[command(name = "remediator")]
#[command(about = "Closed-loop remediation agent for Kubernetes workloads")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: AgentConfig,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the remediation loop until killed
    Run,
    /// Run one iteration and print a JSON summary
    Once,
    /// Resolve a pod's Deployment and print its sanitized YAML
    Inspect {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        pod: String,
    },
    /// Apply one action to a pod's Deployment through the guarded executor
    Exec {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        pod: String,
        /// restart, patch or escalate
        #[arg(long)]
        action: String,
        /// Patch document or escalation message
        #[arg(long)]
        payload: Option<String>,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_directives = if verbose {
        "remediator=debug,notify=debug"
    } else {
        "remediator=info,notify=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn webhook_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to create webhook HTTP client")
}

fn build_executor(config: &AgentConfig, cluster: Arc<dyn ClusterOps>) -> Result<GuardedExecutor> {
    let client = webhook_client()?;
    let escalation: Arc<dyn NotifyChannel> = Arc::new(
        FeishuChannel::from_option(config.escalation_webhook.clone())
            .with_client(client.clone()),
    );
    let confirmation: Arc<dyn NotifyChannel> = Arc::new(
        FeishuChannel::from_option(config.patch_webhook()).with_client(client),
    );

    if !escalation.enabled() {
        tracing::warn!("No escalation webhook configured; escalations will fail delivery");
    }

    Ok(GuardedExecutor::new(
        cluster,
        escalation,
        confirmation,
        config.executor_config(),
    ))
}

fn build_agent(config: &AgentConfig, cluster: Arc<dyn ClusterOps>) -> Result<Agent> {
    let source = PrometheusClient::new(config.prometheus_config())
        .context("Failed to create Prometheus client")?;
    let oracle = OpenAiOracle::new(config.oracle_config()?)
        .context("Failed to create oracle client")?;
    let prompts = match &config.prompt_template {
        Some(path) => PromptRenderer::from_file(path)?,
        None => PromptRenderer::builtin().context("Failed to load built-in prompt")?,
    };

    Ok(Agent::new(
        Arc::new(source),
        OwnershipResolver::new(cluster.clone()),
        DecisionClassifier::new(Arc::new(oracle), prompts),
        build_executor(config, cluster)?,
        config.loop_config(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config = cli.config;
    config.validate()?;

    let cluster: Arc<dyn ClusterOps> = Arc::new(
        KubeCluster::connect(config.kubeconfig.as_deref())
            .await
            .context("Failed to create Kubernetes client")?,
    );

    match cli.command {
        Commands::Run => {
            let agent = build_agent(&config, cluster)?;
            tokio::select! {
                () = agent.run() => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received Ctrl-C, shutting down");
                }
            }
        }
        Commands::Once => {
            let agent = build_agent(&config, cluster)?;
            let report = agent.step().await;
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
        }
        Commands::Inspect { namespace, pod } => {
            let resolved = OwnershipResolver::new(cluster)
                .resolve(&namespace, &pod)
                .await?;
            info!(chain = ?resolved.chain, "Resolved ownership chain");
            let manifest = SanitizedManifest::from_resource(&resolved.deployment)?;
            print!("{}", manifest.to_yaml()?);
        }
        Commands::Exec {
            namespace,
            pod,
            action,
            payload,
        } => {
            let resolved = OwnershipResolver::new(cluster.clone())
                .resolve(&namespace, &pod)
                .await?;
            let target = ExecutionTarget {
                namespace,
                pod,
                workload: resolved.workload_name().to_string(),
            };
            let executor = build_executor(&config, cluster)?;
            match executor.execute_named(&action, payload, &target).await {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                Err(e) => {
                    error!(error = %e, "Execution failed");
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
