// Main entrypoint for the token-resource device plugin.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use token_resource::app::App;
use token_resource::config::{Config, Overrides};
use token_resource::shutdown::GracefulShutdown;

/// Kubernetes device plugin advertising a fixed number of abstract token units.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log verbosity: 0 info, 1 debug, 2 and above trace
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    loglevel: i32,

    /// Socket file name inside the plugin directory
    #[arg(long)]
    socket: Option<String>,

    /// Extended resource name to advertise
    #[arg(long)]
    resource: Option<String>,

    /// Number of units to advertise
    #[arg(long, allow_negative_numbers = true)]
    count: Option<i64>,

    /// Optional config file path
    #[arg(short, long, value_name = "FILE")]
    cfg: Option<PathBuf>,

    /// Device-plugin directory the socket is created in
    #[arg(long, value_name = "DIR")]
    plugin_dir: Option<PathBuf>,

    /// Kubelet registration socket
    #[arg(long, value_name = "FILE")]
    kubelet_socket: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            socket: self.socket.clone(),
            resource: self.resource.clone(),
            count: self.count,
            dir: self.plugin_dir.clone(),
            kubelet_socket: self.kubelet_socket.clone(),
        }
    }
}

/// Loads the config file if one was given, built-in defaults otherwise.
fn load_cfg(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(path).with_context(|| format!("failed to load config from {:?}", path))
        }
        None => Ok(Config::default()),
    }
}

/// Configures structured logging based on configuration.
fn configure_logger(cfg: &Config, verbosity: i32) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_filter(verbosity)));

    if cfg.is_prod() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let cfg = load_cfg(args.cfg.as_ref())?.merge(args.overrides());

    configure_logger(&cfg, args.loglevel);

    info!(
        component = "main",
        event = "start",
        version = env!("CARGO_PKG_VERSION"),
        resource = %cfg.plugin.resource,
        count = cfg.plugin.count,
        "starting token-resource"
    );

    let mut graceful_shutdown = GracefulShutdown::new(CancellationToken::new());
    graceful_shutdown.set_graceful_timeout(cfg.shutdown_timeout());

    // Validation happens here, before any socket is touched.
    let app = App::new(&cfg, &graceful_shutdown)?;

    let mut serving = graceful_shutdown.tracker().spawn(app.serve());

    let shutdown = tokio::select! {
        joined = &mut serving => {
            // Only a fatal error ends the supervisor while the root lifetime is alive.
            if let Err(e) = joined.context("supervisor task failed")? {
                error!(
                    component = "main",
                    scope = "supervisor",
                    event = "fatal",
                    error = %e,
                    "serving cannot continue"
                );
                return Err(e.into());
            }
            graceful_shutdown.await_shutdown().await
        }
        shutdown = graceful_shutdown.await_shutdown() => shutdown,
    };

    if let Err(e) = shutdown {
        error!(
            component = "main",
            scope = "service",
            event = "graceful_shutdown_failed",
            error = %e,
            "failed to gracefully shut down service"
        );
        return Err(e);
    }

    Ok(())
}
