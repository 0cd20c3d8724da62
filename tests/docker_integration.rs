//! End-to-end tests against a real Docker daemon.
//!
//! Requires Docker and network access to pull `localstack/localstack:3.0`.
//! Run with: `cargo test --features integration --test docker_integration`

use std::collections::HashMap;
use std::sync::Arc;

use localstack_stack::StackError;
use localstack_stack::runtime::{DockerStatus, check_docker};
use localstack_stack::stack::{
    Stack, with_container_name, with_init_timeout, with_reuse_existing, with_volume_mounts,
};

async fn docker_available() -> bool {
    let detection = check_docker().await;
    if detection.status != DockerStatus::Available {
        eprintln!("skipping: Docker is {}", detection.status);
        return false;
    }
    true
}

fn test_stack() -> Stack {
    Stack::builder()
        .fault_handler(Arc::new(|err: StackError| {
            eprintln!("watcher fault: {err}")
        }))
        .build()
}

#[tokio::test]
async fn starts_probes_and_stops() {
    if !docker_available().await {
        return;
    }
    let stack = test_stack();

    stack
        .start(false, [with_init_timeout(180)])
        .await
        .expect("LocalStack should start");

    let endpoint = stack.endpoint_url().await;
    assert!(endpoint.starts_with("http://localhost:"), "got {endpoint}");
    assert!(stack.is_functional().await, "SQS probe failed at {endpoint}");

    stack.stop().await.expect("stop should succeed");
    assert!(!stack.is_started().await);
    assert_eq!(stack.endpoint_url().await, "");
}

#[tokio::test]
async fn mounted_directory_is_visible_read_only() {
    if !docker_available().await {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "hello").unwrap();

    let mut volumes = HashMap::new();
    volumes.insert(
        "/opt/fixtures".to_string(),
        dir.path().display().to_string(),
    );

    let stack = test_stack();
    stack
        .start(false, [with_volume_mounts(volumes), with_init_timeout(180)])
        .await
        .expect("LocalStack should start with mounts");
    assert!(stack.is_started().await);

    stack.stop().await.unwrap();
}

#[tokio::test]
async fn named_container_collision_is_reused() {
    if !docker_available().await {
        return;
    }
    let name = format!("localstack-stack-it-{}", std::process::id());

    let first = test_stack();
    first
        .start(
            false,
            [with_container_name(name.clone()), with_init_timeout(180)],
        )
        .await
        .expect("first stack should start");

    let second = test_stack();
    second
        .start(false, [with_container_name(name), with_reuse_existing(true)])
        .await
        .expect("collision with reuse should succeed");
    assert!(!second.is_started().await);
    assert_eq!(second.endpoint_url().await, "");

    first.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_token_stops_container() {
    if !docker_available().await {
        return;
    }
    let stack = test_stack();
    stack
        .start(false, [with_init_timeout(180)])
        .await
        .expect("LocalStack should start");

    stack.shutdown_token().cancel();

    for _ in 0..60 {
        if !stack.is_started().await {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    }
    panic!("watcher did not stop the container");
}
