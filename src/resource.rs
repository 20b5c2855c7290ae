//! Resource identity and per-call synchronization state
//!
//! A [`SyncOperation`] is built when a synchronizer call starts and dropped
//! when it returns. Nothing here is shared between calls.

use std::fmt;
use std::time::Duration;

use kube::Resource;
use tokio::time::Instant;

/// Identifies a remote object by kind, name and (optional) namespace.
///
/// Cluster-scoped kinds such as `Namespace` carry `namespace: None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    /// Resource kind (e.g., "Deployment")
    pub kind: String,
    /// Object name
    pub name: String,
    /// Namespace, `None` for cluster-scoped kinds
    pub namespace: Option<String>,
}

impl ResourceDescriptor {
    /// Descriptor for a namespaced object
    pub fn namespaced(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Descriptor for a cluster-scoped object
    pub fn cluster_scoped(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Build a descriptor from a typed object's metadata.
    ///
    /// Missing names map to an empty string; the API server rejects those on
    /// create, which surfaces as a remote error rather than a local panic.
    pub fn for_object<K>(obj: &K) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let meta = obj.meta();
        Self {
            kind: K::kind(&()).into_owned(),
            name: meta.name.clone().unwrap_or_default(),
            namespace: meta.namespace.clone(),
        }
    }

    /// Namespace as a borrowed str, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Which way a synchronization drives the remote object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Object should exist and satisfy its readiness predicate
    Create,
    /// Object should be absent
    Delete,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Create => write!(f, "ready"),
            Direction::Delete => write!(f, "deleted"),
        }
    }
}

/// What the latest fetch says about the object, relative to the direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceState {
    /// Nothing conclusive yet; keep polling
    Pending,
    /// Object was fetched but does not meet the target
    Observed,
    /// Target reached
    Converged,
    /// Fetch reported the object absent
    NotFound,
    /// Fetch failed with something other than not-found
    Error,
}

impl ConvergenceState {
    /// Collapse a raw observation into the loop's next step.
    ///
    /// Create treats absence as read-after-write lag; delete treats it as done.
    /// Presence never finishes a delete.
    pub fn resolve(self, direction: Direction) -> ConvergenceState {
        match (direction, self) {
            (_, ConvergenceState::Error) => ConvergenceState::Error,
            (Direction::Create, ConvergenceState::NotFound) => ConvergenceState::Pending,
            (Direction::Create, ConvergenceState::Observed) => ConvergenceState::Pending,
            (Direction::Create, ConvergenceState::Converged) => ConvergenceState::Converged,
            (Direction::Delete, ConvergenceState::NotFound) => ConvergenceState::Converged,
            (Direction::Delete, ConvergenceState::Observed | ConvergenceState::Converged) => {
                ConvergenceState::Pending
            }
            (_, ConvergenceState::Pending) => ConvergenceState::Pending,
        }
    }

    /// True for states that end the poll loop
    pub fn is_terminal(self) -> bool {
        matches!(self, ConvergenceState::Converged | ConvergenceState::Error)
    }
}

/// Transient state owned by a single synchronizer call
#[derive(Clone, Debug)]
pub struct SyncOperation {
    /// Object being synchronized
    pub descriptor: ResourceDescriptor,
    /// Create or delete
    pub direction: Direction,
    /// Instant after which a non-converged tick fails with a timeout
    pub deadline: Instant,
    /// Fixed sleep between ticks
    pub poll_interval: Duration,
    started: Instant,
}

impl SyncOperation {
    /// Start an operation now with the given timeout
    pub fn start(
        descriptor: ResourceDescriptor,
        direction: Direction,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        let started = Instant::now();
        Self {
            descriptor,
            direction,
            deadline: started + timeout,
            poll_interval,
            started,
        }
    }

    /// Time since the operation started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the deadline has passed
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Latest instant an in-flight fetch may finish: one interval past the
    /// deadline
    pub fn cutoff(&self) -> Instant {
        self.deadline + self.poll_interval
    }
}
