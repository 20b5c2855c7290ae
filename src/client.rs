//! Resource API client seam
//!
//! The synchronizer only needs three primitives per kind plus a structured
//! not-found signal. [`ResourceClient`] is that seam; [`KubeClient`] is the
//! production implementation on top of kube-rs, and tests inject fakes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{DeleteParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tracing::debug;

use crate::kinds::ManagedResource;
use crate::resource::ResourceDescriptor;

/// HTTP status the API server uses for missing objects
const HTTP_NOT_FOUND: u16 = 404;
/// HTTP status for conflicts, including create-on-existing
const HTTP_CONFLICT: u16 = 409;
/// Status reason distinguishing "already exists" from other conflicts
const REASON_ALREADY_EXISTS: &str = "AlreadyExists";

/// Classified failure from a single API request
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The object (or its namespace) does not exist
    #[error("not found")]
    NotFound,

    /// Create targeted an object that already exists
    #[error("already exists")]
    AlreadyExists,

    /// The API server answered with a non-success status
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// HTTP status code
        code: u16,
        /// Server-provided message
        message: String,
    },

    /// The request did not get a server answer (connection, TLS, decode)
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// True for the not-found signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == HTTP_NOT_FOUND => ApiError::NotFound,
            kube::Error::Api(resp)
                if resp.code == HTTP_CONFLICT && resp.reason == REASON_ALREADY_EXISTS =>
            {
                ApiError::AlreadyExists
            }
            kube::Error::Api(resp) => ApiError::Rejected {
                code: resp.code,
                message: resp.message,
            },
            other => ApiError::Transport(other.to_string()),
        }
    }
}

/// Create/get/delete for one resource kind.
///
/// Implementations must be safe for concurrent use; the synchronizer holds no
/// lock around calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient<K: Clone + Send + Sync + 'static>: Send + Sync {
    /// Issue a create request for `object`
    async fn create(&self, descriptor: &ResourceDescriptor, object: &K) -> Result<K, ApiError>;

    /// Fetch the current state of the object
    async fn get(&self, descriptor: &ResourceDescriptor) -> Result<K, ApiError>;

    /// Issue a delete request; not-found is reported, not swallowed
    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError>;
}

/// [`ResourceClient`] backed by a kube-rs client.
///
/// Cheap to clone; every request is independent.
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
}

impl KubeClient {
    /// Wrap an existing kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying kube client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl<K: ManagedResource> ResourceClient<K> for KubeClient {
    async fn create(&self, descriptor: &ResourceDescriptor, object: &K) -> Result<K, ApiError> {
        debug!(resource = %descriptor, "create");
        K::api(self.client.clone(), descriptor.namespace())
            .create(&PostParams::default(), object)
            .await
            .map_err(ApiError::from)
    }

    async fn get(&self, descriptor: &ResourceDescriptor) -> Result<K, ApiError> {
        K::api(self.client.clone(), descriptor.namespace())
            .get(&descriptor.name)
            .await
            .map_err(ApiError::from)
    }

    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        debug!(resource = %descriptor, "delete");
        K::api(self.client.clone(), descriptor.namespace())
            .delete(&descriptor.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(ApiError::from)
    }
}

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Create a kube client from an optional kubeconfig path.
///
/// With no path the standard inference applies (`KUBECONFIG`, then
/// `~/.kube/config`, then in-cluster). A missing or unreadable configuration
/// is reported as [`crate::Error::Config`].
pub async fn create_client(kubeconfig: Option<&Path>) -> crate::Result<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                crate::Error::config(format!(
                    "failed to read kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| crate::Error::config(format!("failed to load kubeconfig: {}", e)))?
        }
        None => Config::infer()
            .await
            .map_err(|e| crate::Error::config(format!("failed to infer kubeconfig: {}", e)))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
    Ok(Client::try_from(config)?)
}
