//! telemountd - sshfs volume plugin daemon.
//!
//! Serves the Docker volume plugin protocol on a Unix socket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use telemount::{DriverConfig, Registry, SshfsMounter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Unix socket to serve the plugin API on
    #[arg(
        long,
        env = "TELEMOUNT_SOCKET",
        default_value = "/run/docker/plugins/telemount.sock"
    )]
    socket: PathBuf,

    /// Directory under which remote filesystems are mounted
    #[arg(long, env = "TELEMOUNT_VOLUME_ROOT", default_value = "/mnt/volumes")]
    volume_root: PathBuf,

    /// sshfs executable
    #[arg(long, env = "TELEMOUNT_SSHFS", default_value = "sshfs")]
    sshfs: PathBuf,

    /// sshfs -o options, comma separated (replaces the defaults)
    #[arg(long, env = "TELEMOUNT_SSHFS_OPTIONS", value_delimiter = ',')]
    sshfs_options: Option<Vec<String>>,

    /// Seconds to wait for sshfs to attach an endpoint
    #[arg(long, env = "TELEMOUNT_ATTACH_TIMEOUT", default_value_t = 30)]
    attach_timeout: u64,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn driver_config(&self) -> DriverConfig {
        let config = DriverConfig::default()
            .with_volume_root(&self.volume_root)
            .with_socket(&self.socket)
            .with_sshfs_binary(&self.sshfs)
            .with_attach_timeout(Duration::from_secs(self.attach_timeout));
        match &self.sshfs_options {
            Some(options) => config.with_sshfs_options(options.iter().cloned()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("telemount=info,telemountd=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(args.log_json.then(|| fmt::layer().json()))
        .with((!args.log_json).then(fmt::layer))
        .init();

    let config = args.driver_config();
    let mounter = Arc::new(SshfsMounter::new(&config));
    let registry = Arc::new(Registry::new(config.paths.clone(), mounter));

    let socket = &config.paths.socket;
    if let Some(parent) = socket.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    match std::fs::remove_file(socket) {
        Ok(()) => tracing::debug!(socket = %socket.display(), "Removed stale socket"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("removing {}", socket.display())),
    }
    let listener = tokio::net::UnixListener::bind(socket)
        .with_context(|| format!("binding {}", socket.display()))?;

    tracing::info!(
        socket = %socket.display(),
        volume_root = %config.paths.volume_root.display(),
        "telemountd started"
    );

    axum::serve(listener, api::server::app(registry.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("plugin server failed")?;

    let failures = registry.shutdown().await;
    if !failures.is_empty() {
        tracing::warn!(count = failures.len(), "Some remote filesystems stayed attached");
    }
    if let Err(e) = std::fs::remove_file(socket) {
        tracing::debug!(socket = %socket.display(), error = %e, "Socket not removed");
    }
    tracing::info!("telemountd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("Shutting down");
}
