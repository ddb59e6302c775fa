// Package watchdog detects loss of the plugin's listening socket file.
//
// The kubelet wipes its plugin directory when it restarts. Nothing tells the
// plugin about it except that the socket file is gone, so the file is polled.

use std::convert::Infallible;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument, Span};

use crate::retry::RetryPolicy;
use crate::time::{sleep, Cancelled};


/// Interval between two existence checks of the socket file.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("socket {path:?} is gone: {source}")]
    Vanished {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Polls for the continued existence of a socket path.
pub struct SocketWatchdog {
    path: PathBuf,
    policy: RetryPolicy,
    span: Span,
}

impl SocketWatchdog {
    /// Creates a watchdog that checks `path` right away and then every [`POLL_INTERVAL`].
    pub fn new(path: impl Into<PathBuf>, span: Span) -> Self {
        Self {
            path: path.into(),
            policy: RetryPolicy::immediate(POLL_INTERVAL),
            span,
        }
    }

    /// Replaces the polling schedule.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Watches until the path disappears or `lifetime` ends; never returns `Ok`.
    /// Only stats the path, the filesystem is left untouched.
    pub async fn watch(&self, lifetime: &CancellationToken) -> Result<Infallible, WatchError> {
        let span = self.span.clone();
        async {
            debug!(
                component = "watchdog",
                event = "started",
                path = ?self.path,
                "watching plugin socket"
            );

            let mut attempt = 0u64;
            loop {
                sleep(lifetime, self.policy.delay(attempt)).await?;
                attempt = attempt.saturating_add(1);

                if let Err(source) = tokio::fs::symlink_metadata(&self.path).await {
                    warn!(
                        component = "watchdog",
                        event = "socket_vanished",
                        path = ?self.path,
                        error = %source,
                        "plugin socket disappeared"
                    );
                    return Err(WatchError::Vanished {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }
        .instrument(span)
        .await
    }
}
