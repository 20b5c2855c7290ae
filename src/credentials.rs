//! Container registry credentials
//!
//! Test namespaces get an image pull secret so workloads can pull from a
//! private registry.

use std::collections::HashMap;

use crate::Error;

/// Env var holding the registry username
pub const ENV_DOCKER_USER: &str = "DOCKER_USER";
/// Env var holding the registry password
pub const ENV_DOCKER_PASSWORD: &str = "DOCKER_PASSWORD";
/// Env var overriding the registry server
pub const ENV_DOCKER_REGISTRY: &str = "DOCKER_REGISTRY";
/// Env var holding the optional account email
pub const ENV_DOCKER_EMAIL: &str = "DOCKER_EMAIL";
/// Registry used when `DOCKER_REGISTRY` is not set
pub const DEFAULT_REGISTRY: &str = "https://index.docker.io/v1/";

/// Credentials for a single container registry
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    /// Registry server URL, used as the key under `auths`
    pub server: String,
    /// Registry username
    pub username: String,
    /// Registry password or token
    pub password: String,
    /// Account email (may be empty)
    pub email: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

impl RegistryCredentials {
    /// Load credentials from the process environment
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load credentials from a key/value map (e.g., a secret's string data)
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, Error> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(format!("{} must be set to create registry secrets", key)))
        };

        Ok(Self {
            username: required(ENV_DOCKER_USER)?,
            password: required(ENV_DOCKER_PASSWORD)?,
            server: lookup(ENV_DOCKER_REGISTRY)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REGISTRY.to_string()),
            email: lookup(ENV_DOCKER_EMAIL).unwrap_or_default(),
        })
    }

    /// Render the `.dockerconfigjson` payload
    pub fn docker_config_json(&self) -> String {
        let mut auths = serde_json::Map::new();
        auths.insert(
            self.server.clone(),
            serde_json::json!({
                "username": self.username,
                "password": self.password,
                "email": self.email,
            }),
        );
        serde_json::json!({ "auths": auths }).to_string()
    }
}
