//! Stories about staging workload fixtures with the synchronizer
//!
//! The nginx deployment below is the fixture most suites start from: it has
//! to actually serve before the test body runs, and it has to be gone before
//! the next run recreates it under the same name.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::Api;

use k8sit::harness;
use k8sit::{Error, ResourceDescriptor};

use super::helpers::{nginx_deployment, nginx_service, test_synchronizer};

const TIMEOUT: Duration = Duration::from_secs(180);

/// Story: a deployment is created, becomes ready, and is deleted again
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_nginx_deployment_ready_then_gone() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };
    let ns = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let deployment = sync
        .create_and_wait(&nginx_deployment(&ns), TIMEOUT)
        .await
        .expect("deployment should become ready");
    let ready = deployment
        .status
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    assert!(ready > 0);

    sync.delete_and_wait::<Deployment>("nginx-deployment", Some(&ns), TIMEOUT)
        .await
        .expect("deployment should be deleted");
    let deployments: Api<Deployment> = Api::namespaced(sync.client().inner().clone(), &ns);
    assert!(deployments
        .get_opt("nginx-deployment")
        .await
        .unwrap()
        .is_none());

    // the same name can be reused straight away
    sync.create_and_wait(&nginx_deployment(&ns), TIMEOUT)
        .await
        .expect("recreated deployment should become ready");

    harness::delete_namespace(&sync, &ns, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}

/// Story: a service gets its cluster IP before the test talks to it
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_service_gets_cluster_ip() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };
    let ns = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let service = sync
        .create_and_wait(&nginx_service(&ns), TIMEOUT)
        .await
        .expect("service should get a cluster IP");
    assert!(service
        .spec
        .and_then(|s| s.cluster_ip)
        .is_some_and(|ip| !ip.is_empty()));

    sync.delete_and_wait::<Service>("nginx", Some(&ns), TIMEOUT)
        .await
        .expect("service should be deleted");

    harness::delete_namespace(&sync, &ns, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}

/// Story: a deployment whose image never pulls times out with a typed error
#[tokio::test]
#[ignore = "requires kind cluster - run with: K8SIT=true cargo test --test kind -- --ignored"]
async fn story_unpullable_image_times_out() {
    let Some(sync) = test_synchronizer().await else {
        return;
    };
    let ns = harness::create_temp_namespace(&sync, None, TIMEOUT)
        .await
        .expect("namespace should become Active");

    let mut deployment = nginx_deployment(&ns);
    if let Some(spec) = deployment.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
        spec.containers[0].image = Some("k8sit.invalid/does-not-exist:0".to_string());
    }

    let err = sync
        .create_and_wait(&deployment, Duration::from_secs(10))
        .await
        .unwrap_err();
    match err {
        Error::Timeout { descriptor, .. } => {
            assert_eq!(
                descriptor,
                ResourceDescriptor::namespaced("Deployment", "nginx-deployment", &ns)
            );
        }
        other => panic!("expected timeout, got {other}"),
    }

    harness::delete_namespace(&sync, &ns, TIMEOUT)
        .await
        .expect("cleanup should succeed");
}
