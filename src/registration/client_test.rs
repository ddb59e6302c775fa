use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use super::Registrar;
use crate::api::VERSION;
use crate::retry::RetryPolicy;
use crate::support::{identity, kubelet_socket, plugin_dir, FakeKubelet, RESOURCE};

const FAST: RetryPolicy = RetryPolicy::immediate(Duration::from_millis(20));

fn registrar(dir: &std::path::Path) -> Arc<Registrar> {
    Arc::new(
        Registrar::new(identity(dir, 2), kubelet_socket(dir), Span::none())
            .with_policy(FAST)
            .with_dial_timeout(Duration::from_millis(500)),
    )
}

#[test]
fn test_request_carries_identity() {
    let dir = plugin_dir();
    let registrar = registrar(dir.path());
    assert_eq!(registrar.kubelet_socket(), kubelet_socket(dir.path()));

    let request = registrar.request();

    assert_eq!(request.version, VERSION);
    assert_eq!(request.resource_name, RESOURCE);
    assert_eq!(
        request.endpoint,
        dir.path().join("token-resource.sock").to_string_lossy()
    );
    assert!(request.options.is_none());
}

#[tokio::test]
async fn test_registers_once_and_returns() {
    let dir = plugin_dir();
    let kubelet = FakeKubelet::start(&kubelet_socket(dir.path())).await;

    let registrar = registrar(dir.path());
    tokio::time::timeout(Duration::from_secs(5), registrar.register(CancellationToken::new()))
        .await
        .expect("registration did not complete");

    let requests = kubelet.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0], registrar.request());

    kubelet.stop().await;
}

#[tokio::test]
async fn test_retries_until_kubelet_appears() {
    let dir = plugin_dir();
    let registrar = registrar(dir.path());

    let lifetime = CancellationToken::new();
    let task = tokio::spawn({
        let registrar = registrar.clone();
        let lifetime = lifetime.clone();
        async move { registrar.register(lifetime).await }
    });

    // Several dial attempts fail in the meantime.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!task.is_finished());

    let kubelet = FakeKubelet::start(&kubelet_socket(dir.path())).await;
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("registration did not complete")
        .unwrap();

    assert_eq!(kubelet.requests().len(), 1);
    kubelet.stop().await;
}

#[tokio::test]
async fn test_retries_after_rejection() {
    let dir = plugin_dir();
    let kubelet = FakeKubelet::start_rejecting(&kubelet_socket(dir.path()), 2).await;

    tokio::time::timeout(
        Duration::from_secs(5),
        registrar(dir.path()).register(CancellationToken::new()),
    )
    .await
    .expect("registration did not complete");

    assert_eq!(kubelet.calls(), 3);
    assert_eq!(kubelet.requests().len(), 1);
    kubelet.stop().await;
}

#[tokio::test]
async fn test_cancel_stops_retrying() {
    let dir = plugin_dir();
    let registrar = registrar(dir.path());

    let lifetime = CancellationToken::new();
    let task = tokio::spawn({
        let registrar = registrar.clone();
        let lifetime = lifetime.clone();
        async move { registrar.register(lifetime).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    lifetime.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("registrar kept retrying after cancel")
        .unwrap();
}

#[tokio::test]
async fn test_ended_lifetime_sends_nothing() {
    let dir = plugin_dir();
    let kubelet = FakeKubelet::start(&kubelet_socket(dir.path())).await;

    let lifetime = CancellationToken::new();
    lifetime.cancel();
    registrar(dir.path()).register(lifetime).await;

    assert_eq!(kubelet.calls(), 0);
    kubelet.stop().await;
}
