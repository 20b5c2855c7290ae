//! In-memory stand-in for the API server
//!
//! Stores objects as JSON keyed by descriptor and imitates the two lags the
//! synchronizer exists to hide: objects only look ready after a number of
//! reads, and deleted objects stay visible for a number of reads.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;
use serde_json::{json, Value};

use crate::client::{ApiError, ResourceClient};
use crate::kinds::ManagedResource;
use crate::resource::ResourceDescriptor;

/// The nginx deployment used across synchronizer tests
pub(crate) fn nginx_deployment() -> Deployment {
    let labels: BTreeMap<String, String> = [("app".to_string(), "nginx".to_string())].into();
    Deployment {
        metadata: ObjectMeta {
            name: Some("nginx-deployment".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "nginx".to_string(),
                        image: Some("nginx:1.14.2".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: 80,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

struct Stored {
    value: Value,
    reads: u32,
    /// Remaining reads that still see the object after delete
    deleting: Option<u32>,
}

#[derive(Default)]
struct State {
    objects: HashMap<ResourceDescriptor, Stored>,
    gets: usize,
    creates: usize,
    deletes: usize,
}

/// Fake API server implementing [`ResourceClient`] for every managed kind
pub(crate) struct FakeCluster {
    state: Mutex<State>,
    settle_after: u32,
    delete_lag: u32,
    reject_kind: Option<String>,
}

impl FakeCluster {
    /// Objects settle on their first read and vanish as soon as deleted
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            settle_after: 1,
            delete_lag: 0,
            reject_kind: None,
        }
    }

    /// Objects report ready from their `reads`-th read onwards
    pub(crate) fn settle_after(mut self, reads: u32) -> Self {
        self.settle_after = reads;
        self
    }

    /// Deleted objects stay readable for `reads` more reads
    pub(crate) fn delete_lag(mut self, reads: u32) -> Self {
        self.delete_lag = reads;
        self
    }

    /// Creates of `kind` are refused with 403
    pub(crate) fn reject_creates_of(mut self, kind: &str) -> Self {
        self.reject_kind = Some(kind.to_string());
        self
    }

    /// Seed an object directly, bypassing create
    pub(crate) fn insert<K: ManagedResource>(&self, object: &K) {
        let descriptor = ResourceDescriptor::for_object(object);
        let value = serde_json::to_value(object).unwrap();
        self.state.lock().unwrap().objects.insert(
            descriptor,
            Stored {
                value,
                reads: 0,
                deleting: None,
            },
        );
    }

    pub(crate) fn contains(&self, descriptor: &ResourceDescriptor) -> bool {
        self.state.lock().unwrap().objects.contains_key(descriptor)
    }

    /// Stored objects of the given kind
    pub(crate) fn count(&self, kind: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub(crate) fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub(crate) fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub(crate) fn deletes(&self) -> usize {
        self.state.lock().unwrap().deletes
    }
}

/// Fill in what a controller would have written once the object is ready
fn settle(kind: &str, value: &mut Value) {
    let patch = match kind {
        "Deployment" => json!({ "status": { "replicas": 1, "readyReplicas": 1 } }),
        "Namespace" => json!({ "status": { "phase": "Active" } }),
        "PersistentVolumeClaim" => json!({ "status": { "phase": "Pending" } }),
        "Service" => json!({ "spec": { "clusterIP": "10.96.0.10" } }),
        _ => return,
    };
    merge(value, patch);
}

fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, patch) => *target = patch,
    }
}

fn decode<K: ManagedResource>(value: &Value) -> Result<K, ApiError> {
    serde_json::from_value(value.clone()).map_err(|e| ApiError::Transport(e.to_string()))
}

#[async_trait]
impl<K: ManagedResource> ResourceClient<K> for FakeCluster {
    async fn create(&self, descriptor: &ResourceDescriptor, object: &K) -> Result<K, ApiError> {
        let value = serde_json::to_value(object).map_err(|e| ApiError::Rejected {
            code: 400,
            message: e.to_string(),
        })?;

        let mut state = self.state.lock().unwrap();
        state.creates += 1;
        if self.reject_kind.as_deref() == Some(descriptor.kind.as_str()) {
            return Err(ApiError::Rejected {
                code: 403,
                message: format!("{} creation is forbidden", descriptor.kind),
            });
        }
        if state.objects.contains_key(descriptor) {
            return Err(ApiError::AlreadyExists);
        }
        state.objects.insert(
            descriptor.clone(),
            Stored {
                value: value.clone(),
                reads: 0,
                deleting: None,
            },
        );
        decode(&value)
    }

    async fn get(&self, descriptor: &ResourceDescriptor) -> Result<K, ApiError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.gets += 1;

        let stored = state
            .objects
            .get_mut(descriptor)
            .ok_or(ApiError::NotFound)?;

        let deleting = stored.deleting;
        match deleting {
            Some(0) => {
                state.objects.remove(descriptor);
                Err(ApiError::NotFound)
            }
            Some(remaining) => {
                stored.deleting = Some(remaining - 1);
                decode(&stored.value)
            }
            None => {
                stored.reads += 1;
                if stored.reads >= self.settle_after {
                    settle(&descriptor.kind, &mut stored.value);
                }
                decode(&stored.value)
            }
        }
    }

    async fn delete(&self, descriptor: &ResourceDescriptor) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;

        let lag = self.delete_lag;
        let remove = match state.objects.get_mut(descriptor) {
            None => return Err(ApiError::NotFound),
            Some(stored) if stored.deleting.is_some() => false,
            Some(stored) => {
                stored.deleting = Some(lag);
                lag == 0
            }
        };
        if remove {
            state.objects.remove(descriptor);
        }
        Ok(())
    }
}
