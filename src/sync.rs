//! Lifecycle synchronizer
//!
//! Converts the API server's eventual consistency into a single call with a
//! strong postcondition: when [`Synchronizer::ensure_created`] returns `Ok`
//! the object exists and satisfies its readiness predicate, and when
//! [`Synchronizer::ensure_deleted`] returns `Ok` the object is gone.
//!
//! Each call issues its mutation exactly once and then only observes. The
//! observation loop is a small state machine:
//!
//! ```text
//! Issued -> Pending <-> Pending -> Converged | Timeout | Error | Cancelled
//! ```
//!
//! Ticks are a fixed interval apart with no tick-count cap; the deadline and
//! the cancellation token are the only ways a non-converging loop ends.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::client::{ApiError, ResourceClient};
use crate::config::SyncConfig;
use crate::kinds::ManagedResource;
use crate::resource::{ConvergenceState, Direction, ResourceDescriptor, SyncOperation};
use crate::{Error, Result};

/// Poll `fetch` every `op.poll_interval` until the observation converges for
/// `op.direction`.
///
/// Every tick sleeps first and then fetches, so the first observation always
/// happens one interval after the call and even a zero timeout gets one look.
/// After a non-converging tick the deadline is checked. A fetch still in
/// flight one interval past the deadline is abandoned, so a timeout never
/// lands later than that. Cancellation interrupts both the sleep and the
/// fetch.
///
/// Returns the converging object for creates and `None` for deletes. A fetch
/// error other than not-found is fatal on the tick it occurs.
pub async fn observe_until<K, F, Fut, P>(
    op: &SyncOperation,
    cancel: &CancellationToken,
    mut fetch: F,
    ready: P,
) -> Result<Option<K>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<K, ApiError>>,
    P: Fn(&K) -> bool,
{
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(op, tick)),
            _ = tokio::time::sleep(op.poll_interval) => {}
        }
        tick += 1;

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(op, tick)),
            fetched = fetch() => fetched,
            _ = tokio::time::sleep_until(op.cutoff()) => {
                warn!(resource = %op.descriptor, tick, "Fetch still pending past the deadline");
                return Err(timed_out(op));
            }
        };

        let observed = match &fetched {
            Ok(obj) if ready(obj) => ConvergenceState::Converged,
            Ok(_) => ConvergenceState::Observed,
            Err(e) if e.is_not_found() => ConvergenceState::NotFound,
            Err(_) => ConvergenceState::Error,
        };
        let state = observed.resolve(op.direction);

        if state.is_terminal() {
            return match fetched {
                Err(source) if state == ConvergenceState::Error => {
                    warn!(resource = %op.descriptor, tick, error = %source, "Fetch failed, giving up");
                    Err(Error::api(&op.descriptor, source))
                }
                fetched => {
                    debug!(
                        resource = %op.descriptor,
                        tick,
                        elapsed_ms = op.elapsed().as_millis() as u64,
                        "Converged"
                    );
                    Ok(fetched.ok())
                }
            };
        }
        trace!(resource = %op.descriptor, tick, ?observed, ?state, "Not converged yet");

        if op.expired() {
            warn!(
                resource = %op.descriptor,
                tick,
                direction = %op.direction,
                "Timed out waiting for convergence"
            );
            return Err(timed_out(op));
        }
    }
}

fn cancelled(op: &SyncOperation, tick: u64) -> Error {
    debug!(resource = %op.descriptor, tick, "Synchronization cancelled");
    Error::Cancelled {
        descriptor: op.descriptor.clone(),
    }
}

fn timed_out(op: &SyncOperation) -> Error {
    Error::Timeout {
        descriptor: op.descriptor.clone(),
        direction: op.direction,
        waited: op.elapsed(),
    }
}

/// Drives create/delete requests to convergence against a [`ResourceClient`].
///
/// Holds no cluster state between calls; share it freely across tasks.
pub struct Synchronizer<C> {
    client: C,
    config: SyncConfig,
    cancel: CancellationToken,
}

impl<C> Synchronizer<C> {
    /// Create a synchronizer with its own (never cancelled) token
    pub fn new(client: C, config: SyncConfig) -> Self {
        Self {
            client,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to abort in-flight and future calls
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token observed by every poll loop
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Synchronizer tuning
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The underlying resource client
    pub fn client(&self) -> &C {
        &self.client
    }

    fn start(
        &self,
        descriptor: &ResourceDescriptor,
        direction: Direction,
        timeout: Duration,
    ) -> Result<SyncOperation> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled {
                descriptor: descriptor.clone(),
            });
        }
        Ok(SyncOperation::start(
            descriptor.clone(),
            direction,
            timeout,
            self.config.poll_interval,
        ))
    }

    /// Create `spec` once and wait until a fetched copy satisfies `ready`.
    ///
    /// `AlreadyExists` fails immediately unless
    /// [`SyncConfig::adopt_existing`] is set. Not-found while polling is
    /// read-after-write lag and keeps polling; any other fetch error is fatal.
    pub async fn ensure_created<K, P>(
        &self,
        descriptor: &ResourceDescriptor,
        spec: &K,
        ready: P,
        timeout: Duration,
    ) -> Result<K>
    where
        C: ResourceClient<K>,
        K: Clone + Send + Sync + 'static,
        P: Fn(&K) -> bool + Send + Sync,
    {
        let op = self.start(descriptor, Direction::Create, timeout)?;
        info!(resource = %descriptor, timeout_secs = timeout.as_secs(), "Creating resource");

        match ResourceClient::<K>::create(&self.client, descriptor, spec).await {
            Ok(_) => {}
            Err(ApiError::AlreadyExists) if self.config.adopt_existing => {
                debug!(resource = %descriptor, "Resource already exists, adopting it");
            }
            Err(ApiError::AlreadyExists) => {
                return Err(Error::AlreadyExists {
                    descriptor: descriptor.clone(),
                });
            }
            Err(source) => return Err(Error::api(descriptor, source)),
        }

        let converged = observe_until(
            &op,
            &self.cancel,
            || ResourceClient::<K>::get(&self.client, descriptor),
            ready,
        )
        .await?;

        match converged {
            Some(obj) => {
                info!(
                    resource = %descriptor,
                    elapsed_ms = op.elapsed().as_millis() as u64,
                    "Resource ready"
                );
                Ok(obj)
            }
            // create convergence always carries the fetched object
            None => Err(Error::api(descriptor, ApiError::NotFound)),
        }
    }

    /// Delete the object once and wait until fetches report it absent.
    ///
    /// Not-found on the delete itself means already converged: returns
    /// without polling.
    pub async fn ensure_deleted<K>(
        &self,
        descriptor: &ResourceDescriptor,
        timeout: Duration,
    ) -> Result<()>
    where
        C: ResourceClient<K>,
        K: Clone + Send + Sync + 'static,
    {
        let op = self.start(descriptor, Direction::Delete, timeout)?;
        info!(resource = %descriptor, timeout_secs = timeout.as_secs(), "Deleting resource");

        match ResourceClient::<K>::delete(&self.client, descriptor).await {
            Ok(()) => {}
            Err(ApiError::NotFound) => {
                debug!(resource = %descriptor, "Resource already absent");
                return Ok(());
            }
            Err(source) => return Err(Error::api(descriptor, source)),
        }

        observe_until(
            &op,
            &self.cancel,
            || ResourceClient::<K>::get(&self.client, descriptor),
            |_: &K| true,
        )
        .await?;

        info!(
            resource = %descriptor,
            elapsed_ms = op.elapsed().as_millis() as u64,
            "Resource deleted"
        );
        Ok(())
    }

    /// Create a typed object and wait for its kind's readiness predicate
    pub async fn create_and_wait<K>(&self, object: &K, timeout: Duration) -> Result<K>
    where
        C: ResourceClient<K>,
        K: ManagedResource,
    {
        let descriptor = ResourceDescriptor::for_object(object);
        self.ensure_created(&descriptor, object, K::is_ready, timeout)
            .await
    }

    /// Delete an object of kind `K` by name and wait until it is gone
    pub async fn delete_and_wait<K>(
        &self,
        name: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<()>
    where
        C: ResourceClient<K>,
        K: ManagedResource,
    {
        let descriptor = ResourceDescriptor {
            kind: K::kind(&()).into_owned(),
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        };
        self.ensure_deleted::<K>(&descriptor, timeout).await
    }
}
