//! Registration of the plugin with the kubelet.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument, Span};

use super::dial::{dial, DIAL_TIMEOUT};
use crate::api::v1beta1::RegisterRequest;
use crate::api::{RegistrationClient, VERSION};
use crate::config::PluginIdentity;
use crate::retry::RetryPolicy;
use crate::time::sleep;

/// Pause between two registration attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Announces the plugin socket and resource name to the kubelet.
pub struct Registrar {
    identity: Arc<PluginIdentity>,
    kubelet_socket: PathBuf,
    policy: RetryPolicy,
    dial_timeout: Duration,
    span: Span,
}

impl Registrar {
    /// First attempt goes out right away, then one every [`RETRY_INTERVAL`].
    pub fn new(
        identity: Arc<PluginIdentity>,
        kubelet_socket: impl Into<PathBuf>,
        span: Span,
    ) -> Self {
        Self {
            identity,
            kubelet_socket: kubelet_socket.into(),
            policy: RetryPolicy::immediate(RETRY_INTERVAL),
            dial_timeout: DIAL_TIMEOUT,
            span,
        }
    }

    /// Replaces the retry schedule.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn kubelet_socket(&self) -> &Path {
        &self.kubelet_socket
    }

    /// The request sent on every attempt.
    pub fn request(&self) -> RegisterRequest {
        RegisterRequest {
            version: VERSION.to_string(),
            endpoint: self.identity.socket_path.to_string_lossy().into_owned(),
            resource_name: self.identity.resource_name.clone(),
            options: None,
        }
    }

    /// Registers with the kubelet, retrying until acknowledged or until
    /// `lifetime` ends. Failures are logged, never returned: giving up is
    /// only ever caused by the lifetime.
    pub async fn register(&self, lifetime: CancellationToken) {
        async {
            let mut delays = self.policy.delays();
            while !lifetime.is_cancelled() {
                let delay = delays.next().unwrap_or(self.policy.interval);
                if sleep(&lifetime, delay).await.is_err() {
                    return;
                }
                let attempt = delays.attempts();

                let channel = tokio::select! {
                    _ = lifetime.cancelled() => return,
                    res = dial(&self.kubelet_socket, self.dial_timeout) => match res {
                        Ok(channel) => channel,
                        Err(e) => {
                            error!(
                                component = "registration",
                                event = "dial_failed",
                                attempt,
                                error = %e,
                                "dial to kubelet socket failed"
                            );
                            continue;
                        }
                    },
                };
                info!(
                    component = "registration",
                    event = "connected",
                    path = ?self.kubelet_socket(),
                    "connected to kubelet socket"
                );

                // Dropped at the end of this attempt, which closes the connection.
                let mut client = RegistrationClient::new(channel);
                let result = tokio::select! {
                    _ = lifetime.cancelled() => return,
                    res = client.register(self.request()) => res,
                };

                match result {
                    Ok(_) => {
                        info!(
                            component = "registration",
                            event = "registered",
                            resource = %self.identity.resource_name,
                            endpoint = ?self.identity.socket_path,
                            attempt,
                            "registered to kubelet"
                        );
                        return;
                    }
                    Err(status) => {
                        error!(
                            component = "registration",
                            event = "register_failed",
                            attempt,
                            code = ?status.code(),
                            error = %status.message(),
                            "register to kubelet failed"
                        );
                    }
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}
