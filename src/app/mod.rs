// Device plugin application: validated identity wired into a supervisor.

use std::sync::Arc;
use tracing::{error, info_span};

use crate::config::{Config, ConfigError, PluginIdentity};
use crate::plugin::GrpcServer;
use crate::registration::Registrar;
use crate::shutdown::GracefulShutdown;
use crate::supervisor::{Supervisor, SupervisorError};


pub struct App {
    identity: Arc<PluginIdentity>,
    supervisor: Supervisor<GrpcServer>,
}

impl App {
    /// Validates `cfg` and wires the serving components onto the root
    /// lifetime and task tracker of `gsh`. Nothing is bound until [`App::serve`].
    pub fn new(cfg: &Config, gsh: &GracefulShutdown) -> Result<Self, ConfigError> {
        let identity = match cfg.identity() {
            Ok(identity) => Arc::new(identity),
            Err(e) => {
                error!(
                    component = "app",
                    event = "invalid_config",
                    error = %e,
                    "invalid plugin configuration"
                );
                return Err(e);
            }
        };

        let root_span = info_span!("token-resource", resource = %identity.resource_name);
        let server = Arc::new(GrpcServer::new(
            identity.clone(),
            info_span!(parent: &root_span, "server"),
        ));
        let registrar = Registrar::new(
            identity.clone(),
            cfg.kubelet_socket(),
            info_span!(parent: &root_span, "registration"),
        );
        let supervisor = Supervisor::new(
            identity.clone(),
            server,
            registrar,
            gsh.token(),
            gsh.tracker(),
            root_span,
        );

        Ok(Self {
            identity,
            supervisor,
        })
    }

    pub fn identity(&self) -> &PluginIdentity {
        &self.identity
    }

    /// Serves until the root lifetime ends. Only a bind failure is returned.
    pub async fn serve(self) -> Result<(), SupervisorError> {
        self.supervisor.run().await
    }
}
