use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{GracefulShutdown, TimeoutError};

#[tokio::test]
async fn test_waits_for_tracked_tasks() {
    let gsh = GracefulShutdown::new(CancellationToken::new());
    let token = gsh.token();

    let task = gsh.tracker().spawn(async move {
        token.cancelled().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    });

    gsh.token().cancel();
    gsh.await_shutdown().await.unwrap();
    assert!(task.is_finished());
}

#[tokio::test]
async fn test_times_out_on_stuck_task() {
    let mut gsh = GracefulShutdown::new(CancellationToken::new());
    gsh.set_graceful_timeout(Duration::from_millis(50));

    // Ignores the lifetime entirely.
    gsh.tracker().spawn(tokio::time::sleep(Duration::from_secs(30)));

    gsh.token().cancel();
    let err = gsh.await_shutdown().await.unwrap_err();
    assert!(err.downcast_ref::<TimeoutError>().is_some());
}

#[tokio::test]
async fn test_no_tasks_shuts_down_at_once() {
    let gsh = GracefulShutdown::new(CancellationToken::new());
    gsh.token().cancel();

    tokio::time::timeout(Duration::from_secs(1), gsh.await_shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
}
