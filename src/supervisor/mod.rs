//! Serving supervisor: binds the plugin socket, runs one serving iteration
//! (server, socket watchdog, registration) and starts a fresh one whenever
//! the socket disappears or serving fails, until the root lifetime ends.

mod outcome;


pub use outcome::{Component, ServingOutcome, SupervisorError};

use std::io;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::config::PluginIdentity;
use crate::plugin::{ServeError, Server};
use crate::registration::Registrar;
use crate::retry::RetryPolicy;
use crate::watchdog::{SocketWatchdog, WatchError, POLL_INTERVAL};

pub struct Supervisor<S: Server + 'static> {
    identity: Arc<PluginIdentity>,
    server: Arc<S>,
    registrar: Arc<Registrar>,
    root: CancellationToken,
    tracker: TaskTracker,
    watchdog_policy: RetryPolicy,
    span: Span,
}

impl<S: Server + 'static> Supervisor<S> {
    /// Every task the supervisor starts is spawned on `tracker`; `root` is the
    /// process lifetime.
    pub fn new(
        identity: Arc<PluginIdentity>,
        server: Arc<S>,
        registrar: Registrar,
        root: CancellationToken,
        tracker: TaskTracker,
        span: Span,
    ) -> Self {
        Self {
            identity,
            server,
            registrar: Arc::new(registrar),
            root,
            tracker,
            watchdog_policy: RetryPolicy::immediate(POLL_INTERVAL),
            span,
        }
    }

    pub fn with_watchdog_policy(mut self, policy: RetryPolicy) -> Self {
        self.watchdog_policy = policy;
        self
    }

    /// Serves until the root lifetime ends.
    ///
    /// Returns `Ok` once the root lifetime ended and the last iteration was
    /// drained. A socket that cannot be bound is fatal and returned at once.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        let mut iteration: u64 = 0;

        while !self.root.is_cancelled() {
            iteration += 1;
            let span = info_span!(parent: &self.span, "iteration", iteration);

            match self.serve_once().instrument(span).await? {
                Some(outcome) if outcome.is_failure() => {
                    warn!(
                        parent: &self.span,
                        component = "supervisor",
                        event = "restart",
                        iteration,
                        error = %outcome,
                        "serving ended, will try again"
                    );
                }
                Some(outcome) => {
                    debug!(
                        parent: &self.span,
                        component = "supervisor",
                        event = "iteration_ended",
                        iteration,
                        outcome = %outcome,
                        "serving iteration ended"
                    );
                }
                None => break,
            }
        }

        info!(
            parent: &self.span,
            component = "supervisor",
            event = "stopped",
            iterations = iteration,
            "serving stopped"
        );
        Ok(())
    }

    /// One serving iteration. Returns the outcome that ended it, or `None`
    /// when the root lifetime ended first.
    async fn serve_once(&self) -> Result<Option<ServingOutcome>, SupervisorError> {
        let listener = self.bind().await?;
        let lifetime = self.root.child_token();

        // Both serving tasks report exactly once; the supervisor keeps no sender.
        let (tx, mut rx) = mpsc::channel::<ServingOutcome>(2);

        let watchdog = SocketWatchdog::new(&self.identity.socket_path, Span::current())
            .with_policy(self.watchdog_policy);
        let watchdog_tx = tx.clone();
        let watchdog_lifetime = lifetime.clone();
        self.tracker.spawn(
            async move {
                let outcome = match watchdog.watch(&watchdog_lifetime).await {
                    Err(WatchError::Vanished { source, .. }) => {
                        ServingOutcome::SocketInvalidated(source)
                    }
                    Err(WatchError::Cancelled(_)) => ServingOutcome::Stopped(Component::Watchdog),
                    Ok(never) => match never {},
                };
                let _ = watchdog_tx.send(outcome).await;
            }
            .in_current_span(),
        );

        let server = self.server.clone();
        let server_lifetime = lifetime.clone();
        self.tracker.spawn(
            async move {
                // The listener moves into serve and is closed when it returns.
                let outcome = match server.serve(listener, server_lifetime.clone()).await {
                    Ok(()) if server_lifetime.is_cancelled() => {
                        ServingOutcome::Stopped(Component::Server)
                    }
                    Ok(()) => ServingOutcome::ServingFailed(ServeError::Exited),
                    Err(e) => ServingOutcome::ServingFailed(e),
                };
                let _ = tx.send(outcome).await;
            }
            .in_current_span(),
        );

        let registrar = self.registrar.clone();
        let registration_lifetime = lifetime.clone();
        self.tracker.spawn(
            async move { registrar.register(registration_lifetime).await }.in_current_span(),
        );

        let trigger = tokio::select! {
            biased;
            _ = self.root.cancelled() => None,
            outcome = rx.recv() => Some(outcome.unwrap_or(ServingOutcome::Aborted)),
        };
        if let Some(outcome) = &trigger {
            debug!(
                component = "supervisor",
                event = "iteration_trigger",
                outcome = %outcome,
                "serving iteration ending"
            );
        }

        lifetime.cancel();
        while let Some(outcome) = rx.recv().await {
            debug!(
                component = "supervisor",
                event = "drained",
                outcome = %outcome,
                "serving task finished"
            );
        }
        debug!(
            component = "supervisor",
            event = "iteration_drained",
            path = ?self.identity.socket_path,
            "serving tasks finished, listener closed"
        );

        Ok(trigger)
    }

    /// Removes whatever is left at the socket path and binds a fresh listener.
    async fn bind(&self) -> Result<UnixListener, SupervisorError> {
        let path = &self.identity.socket_path;

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(
                component = "supervisor",
                event = "stale_socket_removed",
                path = ?path,
                "removed stale socket"
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                component = "supervisor",
                event = "stale_socket_remove_failed",
                path = ?path,
                error = %e,
                "could not remove stale socket"
            ),
        }

        match UnixListener::bind(path) {
            Ok(listener) => {
                info!(
                    component = "supervisor",
                    event = "listening",
                    path = ?path,
                    "listening on plugin socket"
                );
                Ok(listener)
            }
            Err(source) => {
                error!(
                    component = "supervisor",
                    event = "bind_failed",
                    path = ?path,
                    error = %source,
                    "failed to listen on plugin socket"
                );
                Err(SupervisorError::Bind {
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}
