//! Stories about the namespaces and volumes a test run borrows from the cluster

use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Secret};
use kube::Api;

use k8sit::credentials::RegistryCredentials;
use k8sit::harness::{self, REGISTRY_SECRET_NAME};
use k8sit::kinds;
use k8sit::Error;

use super::helpers::test_synchronizer;

const TIMEOUT: Duration = Duration::from_secs(120);

/// Story: a test run asks for a namespace, uses it, and hands it back
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_temp_namespace_round_trip() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };

    let name = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let namespaces: Api<Namespace> = Api::all(sync.client().inner().clone());
    let ns = namespaces.get(&name).await.expect("namespace should exist");
    assert_eq!(
        ns.status.and_then(|s| s.phase).as_deref(),
        Some(kinds::PHASE_ACTIVE)
    );

    harness::delete_namespace(&sync, &name, TIMEOUT)
        .await
        .expect("namespace should terminate");
    assert!(namespaces
        .get_opt(&name)
        .await
        .expect("lookup should succeed")
        .is_none());

    // deleting again is a no-op
    harness::delete_namespace(&sync, &name, TIMEOUT)
        .await
        .expect("second delete should succeed");
}

/// Story: creating a namespace that already exists fails fast instead of
/// waiting out the timeout
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_duplicate_namespace_is_rejected() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };

    let name = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let err = sync
        .create_and_wait(&kinds::namespace(&name), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyExists { .. }), "got {err}");

    harness::delete_namespace(&sync, &name, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}

/// Story: CI provides registry credentials and every temporary namespace
/// gets a pull secret
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_namespace_with_pull_secret() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };
    let Ok(creds) = RegistryCredentials::from_env() else {
        eprintln!("DOCKER_USER/DOCKER_PASSWORD not set, skipping");
        return;
    };

    let name = harness::create_temp_namespace(&sync, Some(&creds), TIMEOUT)
        .await
        .expect("namespace and secret should be created");

    let secrets: Api<Secret> = Api::namespaced(sync.client().inner().clone(), &name);
    let secret = secrets
        .get(REGISTRY_SECRET_NAME)
        .await
        .expect("pull secret should exist");
    assert_eq!(secret.type_.as_deref(), Some(kinds::DOCKER_CONFIG_JSON_TYPE));

    harness::delete_namespace(&sync, &name, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}

/// Story: a stateful test wants clean volumes on every run
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_pvcs_are_recreated_between_runs() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };
    let ns = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let first = harness::recreate_pvcs(&sync, &["data"], &ns, TIMEOUT)
        .await
        .expect("first run should create the claim");
    let second = harness::recreate_pvcs(&sync, &["data"], &ns, TIMEOUT)
        .await
        .expect("second run should replace the claim");
    assert_ne!(first[0].metadata.uid, second[0].metadata.uid);

    harness::delete_pvcs(&sync, &["data"], &ns, TIMEOUT)
        .await
        .expect("claims should be deleted");
    let claims: Api<PersistentVolumeClaim> = Api::namespaced(sync.client().inner().clone(), &ns);
    assert!(claims.get_opt("data").await.unwrap().is_none());

    harness::delete_namespace(&sync, &ns, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}
