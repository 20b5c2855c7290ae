//! Configuration for the synchronizer and the test harness
//!
//! Everything is read from environment variables with defaults suited to a
//! local kind cluster. Invalid values are reported as [`Error::Config`]
//! rather than silently replaced.

use std::path::PathBuf;
use std::time::Duration;

use crate::Error;

/// Env flag that enables cluster-backed tests when set to "true"
pub const ENV_INTEGRATION: &str = "K8SIT";
/// Env var overriding the poll interval, in milliseconds
pub const ENV_POLL_INTERVAL_MS: &str = "K8SIT_POLL_INTERVAL_MS";
/// Env var overriding the create timeout, in seconds
pub const ENV_CREATE_TIMEOUT_SECS: &str = "K8SIT_CREATE_TIMEOUT_SECS";
/// Env var overriding the delete timeout, in seconds
pub const ENV_DELETE_TIMEOUT_SECS: &str = "K8SIT_DELETE_TIMEOUT_SECS";
/// Env var naming the kind cluster
pub const ENV_CLUSTER_NAME: &str = "K8SIT_CLUSTER_NAME";
/// Standard kubeconfig location override
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

/// Default fixed interval between poll ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default create-and-wait timeout
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default delete-and-wait timeout
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default kind cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "k8sit";

/// Whether cluster-backed integration flows should run at all
pub fn integration_enabled() -> bool {
    flag_enabled(std::env::var(ENV_INTEGRATION).ok().as_deref())
}

fn flag_enabled(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Tuning for the lifecycle synchronizer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Fixed sleep between poll ticks
    pub poll_interval: Duration,
    /// Timeout used by the per-kind create entry points
    pub create_timeout: Duration,
    /// Timeout used by the per-kind delete entry points
    pub delete_timeout: Duration,
    /// Treat `AlreadyExists` on create as a benign race and observe the
    /// existing object instead of failing
    pub adopt_existing: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
            adopt_existing: false,
        }
    }
}

impl SyncConfig {
    /// Load overrides from the environment on top of the defaults
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(ms) = parse_u64(&lookup, ENV_POLL_INTERVAL_MS)? {
            if ms == 0 {
                return Err(Error::config(format!(
                    "{} must be greater than zero",
                    ENV_POLL_INTERVAL_MS
                )));
            }
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, ENV_CREATE_TIMEOUT_SECS)? {
            config.create_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_u64(&lookup, ENV_DELETE_TIMEOUT_SECS)? {
            config.delete_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Same config with a different poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Same config with adoption of pre-existing objects toggled
    pub fn with_adopt_existing(mut self, adopt: bool) -> Self {
        self.adopt_existing = adopt;
        self
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, Error> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::config(format!("invalid {}={:?}: {}", key, raw, e))),
    }
}

/// Where the harness's cluster lives and how to talk to it
#[derive(Clone, Debug)]
pub struct HarnessConfig {
    /// kind cluster name
    pub cluster_name: String,
    /// Kubeconfig written by kind and read by the client
    pub kubeconfig: PathBuf,
    /// Synchronizer tuning
    pub sync: SyncConfig,
}

impl HarnessConfig {
    /// Load from the environment.
    ///
    /// The kubeconfig defaults to `$TMPDIR/<cluster-name>` so parallel
    /// harnesses with different cluster names do not clobber each other.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let cluster_name = lookup(ENV_CLUSTER_NAME)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());
        let kubeconfig = lookup(ENV_KUBECONFIG)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(&cluster_name));

        Ok(Self {
            cluster_name,
            kubeconfig,
            sync: SyncConfig::from_lookup(&lookup)?,
        })
    }
}
