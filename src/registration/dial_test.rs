use std::time::Duration;
use tracing::Span;

use super::{dial, DialError, Registrar};
use crate::api::RegistrationClient;
use crate::support::{identity, kubelet_socket, plugin_dir, FakeKubelet};

#[tokio::test]
async fn test_dial_reaches_live_socket() {
    let dir = plugin_dir();
    let kubelet = FakeKubelet::start(&kubelet_socket(dir.path())).await;

    let channel = dial(kubelet.path(), Duration::from_secs(2))
        .await
        .expect("dial live kubelet socket");

    // The returned channel carries real calls.
    let registrar = Registrar::new(identity(dir.path(), 1), kubelet.path(), Span::none());
    RegistrationClient::new(channel)
        .register(registrar.request())
        .await
        .unwrap();
    assert_eq!(kubelet.requests().len(), 1);

    kubelet.stop().await;
}

#[tokio::test]
async fn test_dial_missing_socket_fails_eagerly() {
    let dir = plugin_dir();
    let missing = dir.path().join("absent.sock");

    let err = tokio::time::timeout(Duration::from_secs(2), dial(&missing, Duration::from_secs(1)))
        .await
        .expect("dial hung on a missing socket")
        .unwrap_err();

    match err {
        DialError::Connect { path, .. } => assert_eq!(path, missing),
        other => panic!("expected connect error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dial_stale_socket_file_fails() {
    let dir = plugin_dir();
    let socket = kubelet_socket(dir.path());
    // Bound once, then closed: the file stays but nothing accepts.
    drop(std::os::unix::net::UnixListener::bind(&socket).unwrap());
    assert!(socket.exists());

    let err = dial(&socket, Duration::from_millis(500)).await.unwrap_err();
    assert!(matches!(err, DialError::Connect { .. } | DialError::Timeout { .. }));
}
