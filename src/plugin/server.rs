//! gRPC server for the device-plugin contract.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument, Span};

use super::TokenPlugin;
use crate::api::DevicePluginServer;
use crate::config::PluginIdentity;

/// How long in-flight calls may drain once the serving lifetime ended.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("grpc transport failed: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("server exited while its lifetime was still alive")]
    Exited,
}

/// Server trait for serving the plugin on an already bound listener.
#[async_trait::async_trait]
pub trait Server: Send + Sync {
    /// Serves on `listener` until `lifetime` ends (`Ok`) or serving fails.
    /// The listener is closed when this returns.
    async fn serve(&self, listener: UnixListener, lifetime: CancellationToken)
        -> Result<(), ServeError>;
}

/// Tonic implementation serving [`TokenPlugin`].
pub struct GrpcServer {
    identity: Arc<PluginIdentity>,
    grace: Duration,
    span: Span,
}

impl GrpcServer {
    pub fn new(identity: Arc<PluginIdentity>, span: Span) -> Self {
        Self {
            identity,
            grace: SHUTDOWN_GRACE,
            span,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait::async_trait]
impl Server for GrpcServer {
    async fn serve(
        &self,
        listener: UnixListener,
        lifetime: CancellationToken,
    ) -> Result<(), ServeError> {
        let path = self.identity.socket_path.clone();
        let plugin = TokenPlugin::new(self.identity.clone(), lifetime.clone(), self.span.clone());

        let shutdown_token = lifetime.clone();
        let serve_future = tonic::transport::Server::builder()
            .add_service(DevicePluginServer::new(plugin))
            .serve_with_incoming_shutdown(UnixListenerStream::new(listener), async move {
                shutdown_token.cancelled().await;
            });

        async {
            info!(
                component = "server",
                event = "started",
                path = ?path,
                "server started"
            );

            tokio::pin!(serve_future);
            let result = tokio::select! {
                res = &mut serve_future => res,
                _ = lifetime.cancelled() => {
                    match tokio::time::timeout(self.grace, &mut serve_future).await {
                        Ok(res) => res,
                        Err(_) => {
                            warn!(
                                component = "server",
                                event = "drain_timeout",
                                path = ?path,
                                grace_ms = self.grace.as_millis() as u64,
                                "in-flight calls did not drain, dropping server"
                            );
                            Ok(())
                        }
                    }
                }
            };

            if let Err(e) = result {
                error!(
                    component = "server",
                    event = "serve_failed",
                    path = ?path,
                    error = %e,
                    "server failed to serve"
                );
                return Err(e.into());
            }

            info!(
                component = "server",
                event = "stopped",
                path = ?path,
                "server stopped"
            );
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}
