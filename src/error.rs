//! Error types for k8sit
//!
//! Remote failures keep the descriptor of the object being synchronized so a
//! test failure names the resource that did not converge. Timeouts and
//! cancellation are synthesized locally and never confused with API errors.

use std::time::Duration;

use thiserror::Error;

use crate::client::ApiError;
use crate::resource::{Direction, ResourceDescriptor};

/// Main error type for k8sit operations
#[derive(Debug, Error)]
pub enum Error {
    /// Create was rejected because the object already exists
    #[error("{descriptor} already exists")]
    AlreadyExists {
        /// Object the create targeted
        descriptor: ResourceDescriptor,
    },

    /// The API rejected a request or could not be reached
    #[error("api error for {descriptor}: {source}")]
    Api {
        /// Object the request targeted
        descriptor: ResourceDescriptor,
        /// Classified client error
        source: ApiError,
    },

    /// The deadline elapsed before the object converged
    #[error("timed out after {waited:?} waiting for {descriptor} to be {direction}")]
    Timeout {
        /// Object that did not converge
        descriptor: ResourceDescriptor,
        /// What it was expected to converge to
        direction: Direction,
        /// Time spent before giving up
        waited: Duration,
    },

    /// The caller's cancellation token fired while polling
    #[error("cancelled while waiting for {descriptor}")]
    Cancelled {
        /// Object being synchronized
        descriptor: ResourceDescriptor,
    },

    /// Missing or invalid process configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what is missing or invalid
        message: String,
    },

    /// An external command (kind) failed
    #[error("command failed: {message}")]
    Command {
        /// Description including the command's stderr
        message: String,
    },

    /// Kubernetes client construction error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// IO error (spawning commands, reading files)
    #[error("io error: {source}")]
    Io {
        /// The underlying IO error
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an API error for the given object
    pub fn api(descriptor: &ResourceDescriptor, source: ApiError) -> Self {
        Self::Api {
            descriptor: descriptor.clone(),
            source,
        }
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a command error with the given message
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command {
            message: msg.into(),
        }
    }

    /// True if the deadline elapsed before convergence
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True if the call ended because its cancellation token fired
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// True if a create hit an existing object
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Error::AlreadyExists { .. })
    }

    /// True if the error originated at the remote API rather than locally
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Error::AlreadyExists { .. } | Error::Api { .. } | Error::Kube { .. }
        )
    }
}
