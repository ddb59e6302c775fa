// Scriptable Server implementation that records how it was driven.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use super::is_socket;
use crate::plugin::{ServeError, Server};

/// Fails the first `failures` calls right away, then serves (accepting
/// nothing) until the lifetime ends.
pub struct FlakyServer {
    socket_path: PathBuf,
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    sockets: Mutex<Vec<bool>>,
}

impl FlakyServer {
    pub fn new(socket_path: impl Into<PathBuf>, failures: usize) -> Self {
        Self {
            socket_path: socket_path.into(),
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            sockets: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently inside `serve`.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently running `serve` calls seen.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Whether a socket file existed at the path at the start of every call.
    pub fn sockets(&self) -> Vec<bool> {
        self.sockets.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Server for FlakyServer {
    async fn serve(
        &self,
        listener: UnixListener,
        lifetime: CancellationToken,
    ) -> Result<(), ServeError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sockets.lock().unwrap().push(is_socket(&self.socket_path));

        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result = if fail {
            Err(ServeError::Exited)
        } else {
            lifetime.cancelled().await;
            Ok(())
        };

        drop(listener);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
