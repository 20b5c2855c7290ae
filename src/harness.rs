//! Test environment helpers built on the synchronizer
//!
//! Every helper waits for convergence, so a test can use what it asked for as
//! soon as the call returns. Callers clean up with the matching delete
//! helper; the only rollback is a temporary namespace whose pull secret
//! could not be created.

use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Secret};
use tracing::{info, warn};

use crate::client::ResourceClient;
use crate::credentials::RegistryCredentials;
use crate::kinds::{self, DEFAULT_PVC_BYTES, DEFAULT_STORAGE_CLASS};
use crate::naming::new_unique_name;
use crate::sync::Synchronizer;
use crate::Result;

/// Name of the pull secret created in temporary namespaces
pub const REGISTRY_SECRET_NAME: &str = "registry-credentials";

/// Create a uniquely named namespace and wait for it to become Active.
///
/// With `registry` set, an image pull secret named
/// [`REGISTRY_SECRET_NAME`] is created in it as well. Each step gets its own
/// `timeout`. If the secret cannot be created the namespace is deleted again
/// before the error is returned, since the caller never learns its name.
pub async fn create_temp_namespace<C>(
    sync: &Synchronizer<C>,
    registry: Option<&RegistryCredentials>,
    timeout: Duration,
) -> Result<String>
where
    C: ResourceClient<Namespace> + ResourceClient<Secret>,
{
    let name = new_unique_name();
    sync.create_and_wait(&kinds::namespace(&name), timeout)
        .await?;

    if let Some(creds) = registry {
        let secret = kinds::registry_secret(creds, REGISTRY_SECRET_NAME, &name);
        if let Err(err) = sync.create_and_wait(&secret, timeout).await {
            if let Err(cleanup) = delete_namespace(sync, &name, timeout).await {
                warn!(namespace = %name, error = %cleanup, "Failed to clean up namespace");
            }
            return Err(err);
        }
    }

    info!(namespace = %name, pull_secret = registry.is_some(), "Temporary namespace ready");
    Ok(name)
}

/// Delete a namespace and wait until it is gone; absent is success
pub async fn delete_namespace<C>(sync: &Synchronizer<C>, name: &str, timeout: Duration) -> Result<()>
where
    C: ResourceClient<Namespace>,
{
    sync.delete_and_wait::<Namespace>(name, None, timeout)
        .await
}

/// Replace each named claim with a fresh local-path claim.
///
/// Existing claims are deleted and waited out first so the new claim does not
/// inherit a released volume.
pub async fn recreate_pvcs<C>(
    sync: &Synchronizer<C>,
    names: &[&str],
    namespace: &str,
    timeout: Duration,
) -> Result<Vec<PersistentVolumeClaim>>
where
    C: ResourceClient<PersistentVolumeClaim>,
{
    let mut claims = Vec::with_capacity(names.len());
    for name in names {
        sync.delete_and_wait::<PersistentVolumeClaim>(name, Some(namespace), timeout)
            .await?;
        let pvc = kinds::local_path_pvc(name, namespace, DEFAULT_STORAGE_CLASS, DEFAULT_PVC_BYTES);
        claims.push(sync.create_and_wait(&pvc, timeout).await?);
    }
    Ok(claims)
}

/// Delete each named claim and wait until it is gone
pub async fn delete_pvcs<C>(
    sync: &Synchronizer<C>,
    names: &[&str],
    namespace: &str,
    timeout: Duration,
) -> Result<()>
where
    C: ResourceClient<PersistentVolumeClaim>,
{
    for name in names {
        sync.delete_and_wait::<PersistentVolumeClaim>(name, Some(namespace), timeout)
            .await?;
    }
    Ok(())
}
