// In-process stand-in for the kubelet Registration service.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

use crate::api::v1beta1::registration_server::{Registration, RegistrationServer};
use crate::api::v1beta1::{Empty, RegisterRequest};

#[derive(Default)]
struct KubeletState {
    requests: Mutex<Vec<RegisterRequest>>,
    calls: AtomicUsize,
    rejections_left: AtomicUsize,
}

struct KubeletService {
    state: Arc<KubeletState>,
}

#[tonic::async_trait]
impl Registration for KubeletService {
    async fn register(&self, request: Request<RegisterRequest>) -> Result<Response<Empty>, Status> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);

        let rejected = self
            .state
            .rejections_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(Status::unavailable("kubelet not ready"));
        }

        self.state.requests.lock().unwrap().push(request.into_inner());
        Ok(Response::new(Empty {}))
    }
}

/// A Registration server on a unix socket that records accepted requests.
pub struct FakeKubelet {
    path: PathBuf,
    state: Arc<KubeletState>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl FakeKubelet {
    pub async fn start(path: &Path) -> Self {
        Self::start_rejecting(path, 0).await
    }

    /// Starts a kubelet answering the first `rejections` calls with UNAVAILABLE.
    pub async fn start_rejecting(path: &Path, rejections: usize) -> Self {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).expect("bind fake kubelet socket");

        let state = Arc::new(KubeletState {
            rejections_left: AtomicUsize::new(rejections),
            ..Default::default()
        });
        let token = CancellationToken::new();

        let service = RegistrationServer::new(KubeletService {
            state: state.clone(),
        });
        let shutdown = token.clone();
        let handle = tokio::spawn(async move {
            let _ = tonic::transport::Server::builder()
                .add_service(service)
                .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
                    shutdown.cancelled().await;
                })
                .await;
        });

        Self {
            path: path.to_path_buf(),
            state,
            token,
            handle,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accepted registrations, in arrival order.
    pub fn requests(&self) -> Vec<RegisterRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Every Register call, rejected ones included.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Waits until at least `n` registrations were accepted, panics after `timeout`.
    pub async fn wait_for_registrations(
        &self,
        n: usize,
        timeout: Duration,
    ) -> Vec<RegisterRequest> {
        let ok = super::wait_until(timeout, || self.requests().len() >= n).await;
        let requests = self.requests();
        assert!(ok, "expected {n} registrations, got {}", requests.len());
        requests
    }

    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
        let _ = std::fs::remove_file(&self.path);
    }
}
