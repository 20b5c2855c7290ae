//! Command line entry points
//!
//! Thin wrappers that let CI scripts bring a kind cluster up, hand out
//! temporary namespaces and tear both down again.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::client::KubeClient;
use crate::cluster::KindCluster;
use crate::config::{HarnessConfig, DEFAULT_CLUSTER_NAME, ENV_CLUSTER_NAME, ENV_KUBECONFIG};
use crate::credentials::RegistryCredentials;
use crate::harness;
use crate::naming::new_unique_name;
use crate::sync::Synchronizer;
use crate::Result;

/// k8sit - ephemeral Kubernetes test environments
#[derive(Parser, Debug)]
#[command(name = "k8sit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "K8SIT_LOG_JSON")]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the kind cluster
    #[command(subcommand)]
    Cluster(ClusterCommand),

    /// Manage temporary namespaces
    #[command(subcommand)]
    Namespace(NamespaceCommand),

    /// Print a fresh unique resource name
    Name,
}

/// kind cluster lifecycle
#[derive(Subcommand, Debug)]
pub enum ClusterCommand {
    /// Create the cluster (replacing a stale one) and wait for nodes
    Up(ClusterArgs),
    /// Delete the cluster
    Down(ClusterArgs),
}

/// Where the cluster lives
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// kind cluster name
    #[arg(long, env = ENV_CLUSTER_NAME, default_value = DEFAULT_CLUSTER_NAME)]
    pub name: String,

    /// Kubeconfig file for the cluster (defaults to $TMPDIR/<name>)
    #[arg(long, env = ENV_KUBECONFIG)]
    pub kubeconfig: Option<PathBuf>,

    /// Seconds to wait for nodes to become Ready
    #[arg(long, default_value = "120")]
    pub nodes_timeout_secs: u64,
}

impl ClusterArgs {
    fn cluster(&self) -> KindCluster {
        let kubeconfig = self
            .kubeconfig
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(&self.name));
        KindCluster::new(self.name.clone(), kubeconfig)
    }
}

/// Temporary namespace lifecycle
#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    /// Create a uniquely named namespace and print its name
    Create {
        /// Also create an image pull secret from DOCKER_USER/DOCKER_PASSWORD
        #[arg(long)]
        registry_secret: bool,
    },
    /// Delete a namespace and wait until it is gone
    Delete {
        /// Namespace name
        name: String,
    },
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Cluster(ClusterCommand::Up(args)) => {
                let cluster = args.cluster();
                cluster
                    .create(Duration::from_secs(args.nodes_timeout_secs))
                    .await?;
                println!("{}", cluster.kubeconfig.display());
                Ok(())
            }
            Commands::Cluster(ClusterCommand::Down(args)) => args.cluster().delete().await,
            Commands::Namespace(cmd) => run_namespace(cmd).await,
            Commands::Name => {
                println!("{}", new_unique_name());
                Ok(())
            }
        }
    }
}

async fn run_namespace(cmd: NamespaceCommand) -> Result<()> {
    let config = HarnessConfig::from_env()?;
    let sync = synchronizer(&config).await?;
    cancel_on_ctrl_c(&sync);

    match cmd {
        NamespaceCommand::Create { registry_secret } => {
            let creds = if registry_secret {
                Some(RegistryCredentials::from_env()?)
            } else {
                None
            };
            let name = harness::create_temp_namespace(
                &sync,
                creds.as_ref(),
                sync.config().create_timeout,
            )
            .await?;
            println!("{name}");
        }
        NamespaceCommand::Delete { name } => {
            harness::delete_namespace(&sync, &name, sync.config().delete_timeout).await?;
            info!(namespace = %name, "Namespace deleted");
        }
    }
    Ok(())
}

/// Abort the in-flight wait when the user interrupts
fn cancel_on_ctrl_c<C>(sync: &Synchronizer<C>) {
    let token = sync.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            token.cancel();
        }
    });
}

async fn synchronizer(config: &HarnessConfig) -> Result<Synchronizer<KubeClient>> {
    let cluster = KindCluster::from_config(config);
    let client = cluster.client().await?;
    Ok(Synchronizer::new(KubeClient::new(client), config.sync.clone()))
}
