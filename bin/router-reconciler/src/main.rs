use anyhow::Result;
use router_core::{ProcessSupervisor, ReconcileEngine, ServiceDirectory};
use router_discovery::{DockerDirectory, GalacticDirectory};
use router_nginx::NginxRenderer;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::{DirectoryKind, LogFormat, ReconcilerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ReconcilerConfig::from_env()?;
    init_tracing(&config);

    info!("Starting router-reconciler...");
    if config.debug {
        info!("Debug logging enabled");
    }

    match config.directory {
        DirectoryKind::Docker => {
            info!("Discovering services from Docker at {}", config.docker_socket.display());
            reconcile(DockerDirectory::new(&config.docker_socket), &config).await
        }
        DirectoryKind::Galactic => {
            info!("Discovering services from Galactic VPCs");
            reconcile(GalacticDirectory::new().await?, &config).await
        }
    }
}

fn init_tracing(config: &ReconcilerConfig) {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

/// Bootstrap the engine, then run it until the managed process exits or a
/// shutdown signal arrives
async fn reconcile<D>(directory: D, config: &ReconcilerConfig) -> Result<()>
where
    D: ServiceDirectory,
{
    let supervisor = ProcessSupervisor::new(config.supervisor.clone());

    let (engine, exit_watch) =
        ReconcileEngine::bootstrap(directory, NginxRenderer::new(), supervisor, config.watch_interval)
            .await
            .map_err(|e| {
                error!("Couldn't start managed process with a valid configuration: {}", e);
                e
            })?;

    tokio::select! {
        _ = engine.run() => Ok(()),
        exited = exit_watch.wait() => {
            error!("{}", exited);
            Err(anyhow::Error::from(exited))
        }
        received = shutdown_signal() => {
            received?;
            info!("Shutdown signal received, exiting...");
            Ok(())
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
