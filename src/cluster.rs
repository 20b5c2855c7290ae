//! kind cluster bootstrap
//!
//! Drives the external `kind` binary. A created cluster is only handed back
//! once every node reports Ready, using the same polling loop as the
//! synchronizer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::Client;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{create_client, ApiError};
use crate::config::{HarnessConfig, DEFAULT_POLL_INTERVAL};
use crate::resource::{Direction, ResourceDescriptor, SyncOperation};
use crate::sync::observe_until;
use crate::{Error, Result};

const KIND_BINARY: &str = "kind";
const CONDITION_READY: &str = "Ready";
const STATUS_TRUE: &str = "True";

/// Default time allowed for nodes to report Ready after `kind create`
pub const DEFAULT_NODES_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// A named kind cluster and the kubeconfig file it is reachable through
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KindCluster {
    /// kind cluster name
    pub name: String,
    /// Kubeconfig file kind writes the cluster's context into
    pub kubeconfig: PathBuf,
}

impl KindCluster {
    /// Describe a cluster without touching it
    pub fn new(name: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    /// Cluster named and located per the harness configuration
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.cluster_name.clone(), config.kubeconfig.clone())
    }

    /// Create the cluster and wait for its nodes.
    ///
    /// A cluster left over under the same name is deleted first. Returns a
    /// client for the new cluster once every node is Ready.
    pub async fn create(&self, nodes_ready_timeout: Duration) -> Result<Client> {
        info!(cluster = %self.name, kubeconfig = %self.kubeconfig.display(), "Creating kind cluster");

        // a stale cluster may or may not exist
        let _ = Command::new(KIND_BINARY)
            .args(self.delete_args()?)
            .output()
            .await;

        run_kind(self.create_args()?, "kind create cluster").await?;

        let client = create_client(Some(&self.kubeconfig)).await?;
        wait_for_nodes_ready(&client, nodes_ready_timeout, &CancellationToken::new()).await?;

        info!(cluster = %self.name, "kind cluster ready");
        Ok(client)
    }

    /// Delete the cluster; deleting a missing cluster succeeds
    pub async fn delete(&self) -> Result<()> {
        info!(cluster = %self.name, "Deleting kind cluster");
        run_kind(self.delete_args()?, "kind delete cluster").await
    }

    /// Client for an already running cluster
    pub async fn client(&self) -> Result<Client> {
        create_client(Some(&self.kubeconfig)).await
    }

    fn create_args(&self) -> Result<Vec<String>> {
        Ok(vec![
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--kubeconfig".to_string(),
            kubeconfig_arg(&self.kubeconfig)?,
        ])
    }

    fn delete_args(&self) -> Result<Vec<String>> {
        Ok(vec![
            "delete".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--kubeconfig".to_string(),
            kubeconfig_arg(&self.kubeconfig)?,
        ])
    }
}

fn kubeconfig_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::command("kubeconfig path contains invalid UTF-8"))
}

async fn run_kind(args: Vec<String>, what: &str) -> Result<()> {
    debug!(args = ?args, "Running kind");
    let output = Command::new(KIND_BINARY).args(&args).output().await?;
    if !output.status.success() {
        return Err(Error::command(format!(
            "{} failed: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// True when there is at least one node and every node has Ready=True
pub fn all_nodes_ready(nodes: &[Node]) -> bool {
    !nodes.is_empty()
        && nodes.iter().all(|node| {
            node.status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .is_some_and(|conds| {
                    conds
                        .iter()
                        .any(|c| c.type_ == CONDITION_READY && c.status == STATUS_TRUE)
                })
        })
}

/// A freshly created API server may refuse connections for a while; read
/// that as "no nodes yet" so the wait keeps polling instead of failing.
fn pending_on_transport(
    listed: std::result::Result<Vec<Node>, ApiError>,
) -> std::result::Result<Vec<Node>, ApiError> {
    match listed {
        Err(ApiError::Transport(reason)) => {
            debug!(%reason, "API server not reachable yet");
            Ok(Vec::new())
        }
        other => other,
    }
}

/// Poll the node list until every node is Ready or `timeout` elapses.
///
/// Transport errors keep polling; a rejected request ends the wait.
pub async fn wait_for_nodes_ready(
    client: &Client,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    let nodes: Api<Node> = Api::all(client.clone());
    let op = SyncOperation::start(
        ResourceDescriptor::cluster_scoped("Node", "*"),
        Direction::Create,
        timeout,
        DEFAULT_POLL_INTERVAL,
    );

    observe_until(
        &op,
        cancel,
        || async {
            pending_on_transport(
                nodes
                    .list(&ListParams::default())
                    .await
                    .map(|list| list.items)
                    .map_err(ApiError::from),
            )
        },
        |items: &Vec<Node>| all_nodes_ready(items),
    )
    .await?;
    Ok(())
}
