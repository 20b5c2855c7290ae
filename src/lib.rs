//! k8sit - lifecycle synchronizer for ephemeral Kubernetes test environments
//!
//! Creating or deleting an object through the API server only records intent;
//! the object becomes usable (or disappears) some time later. This crate turns
//! that eventual consistency into blocking calls that return once the cluster
//! has actually converged, or fail with a typed error once a deadline passes.
//!
//! # Modules
//!
//! - [`sync`] - The synchronizer: issue a mutation once, then poll to convergence
//! - [`resource`] - Resource descriptors, directions and convergence states
//! - [`client`] - The [`client::ResourceClient`] seam and its kube-backed implementation
//! - [`kinds`] - Supported kinds, their readiness predicates and object builders
//! - [`harness`] - Temporary namespaces and local-path PVC helpers
//! - [`cluster`] - kind cluster bootstrap and teardown
//! - [`credentials`] - Image registry credentials for pull secrets
//! - [`naming`] - Collision-resistant names for ephemeral resources
//! - [`config`] - Environment driven configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`cli`] - Command line entry points
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cli;
pub mod client;
pub mod cluster;
pub mod config;
pub mod credentials;
pub mod error;
pub mod harness;
pub mod kinds;
pub mod naming;
pub mod resource;
pub mod sync;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiError, KubeClient, ResourceClient};
pub use config::{integration_enabled, HarnessConfig, SyncConfig};
pub use error::Error;
pub use resource::{ConvergenceState, Direction, ResourceDescriptor};
pub use sync::Synchronizer;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
