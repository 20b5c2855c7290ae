//! Resource kinds the harness synchronizes
//!
//! Each kind knows how to scope its `Api` and when a fetched object counts as
//! ready. The builders produce the fixtures test environments need most often.

use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Namespace, PersistentVolumeClaim, PersistentVolumeClaimSpec, Secret, Service,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::{ByteString, NamespaceResourceScope};
use kube::api::{Api, ObjectMeta};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::RegistryCredentials;

/// Namespace phase once the namespace accepts objects
pub const PHASE_ACTIVE: &str = "Active";
/// PVC phase after its volume is gone
pub const PHASE_LOST: &str = "Lost";
/// Storage class provisioned by kind's local-path provisioner
pub const DEFAULT_STORAGE_CLASS: &str = "standard";
/// Default size for local-path claims (2 GiB)
pub const DEFAULT_PVC_BYTES: u64 = 2 * GIB;
/// Secret type for image pull secrets
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
/// Data key holding the docker config in a pull secret
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// A typed Kubernetes kind the synchronizer can create, observe and delete.
///
/// Implement this for each kind to give it API scoping and a readiness
/// predicate. Cluster-scoped kinds ignore the namespace.
pub trait ManagedResource:
    Resource<DynamicType = ()>
    + Clone
    + DeserializeOwned
    + Serialize
    + Debug
    + Send
    + Sync
    + 'static
{
    /// Api handle for this kind in the given namespace
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;

    /// True once the fetched object is usable
    fn is_ready(&self) -> bool;
}

fn namespaced_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::default_namespaced(client),
    }
}

impl ManagedResource for Deployment {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        namespaced_api(client, namespace)
    }

    /// At least one replica reports ready
    fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
            > 0
    }
}

impl ManagedResource for Service {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        namespaced_api(client, namespace)
    }

    fn is_ready(&self) -> bool {
        self.spec
            .as_ref()
            .and_then(|s| s.cluster_ip.as_deref())
            .is_some_and(|ip| !ip.is_empty())
    }
}

impl ManagedResource for Namespace {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }

    fn is_ready(&self) -> bool {
        self.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PHASE_ACTIVE)
    }
}

impl ManagedResource for PersistentVolumeClaim {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        namespaced_api(client, namespace)
    }

    /// Claims on WaitForFirstConsumer classes stay Pending until a pod mounts
    /// them, so existence is enough unless the volume was lost.
    fn is_ready(&self) -> bool {
        self.status.as_ref().and_then(|s| s.phase.as_deref()) != Some(PHASE_LOST)
    }
}

impl ManagedResource for Secret {
    fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
        namespaced_api(client, namespace)
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Build a bare namespace object
pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Render a byte count as a binary-SI quantity ("2Gi", "512Mi", "1000")
pub fn binary_quantity(bytes: u64) -> Quantity {
    if bytes != 0 && bytes % GIB == 0 {
        Quantity(format!("{}Gi", bytes / GIB))
    } else if bytes != 0 && bytes % MIB == 0 {
        Quantity(format!("{}Mi", bytes / MIB))
    } else {
        Quantity(bytes.to_string())
    }
}

/// Build a ReadWriteOnce claim for the local-path provisioner
pub fn local_path_pvc(
    name: &str,
    namespace: &str,
    storage_class: &str,
    bytes: u64,
) -> PersistentVolumeClaim {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), binary_quantity(bytes));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: Some(storage_class.to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build an image pull secret carrying the registry credentials
pub fn registry_secret(creds: &RegistryCredentials, name: &str, namespace: &str) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(
        DOCKER_CONFIG_JSON_KEY.to_string(),
        ByteString(creds.docker_config_json().into_bytes()),
    );

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        type_: Some(DOCKER_CONFIG_JSON_TYPE.to_string()),
        ..Default::default()
    }
}
