use std::{future::IntoFuture, time::Duration};

use anyhow::{self, Error as AnyhowError};
use task_manager::{
    Deployment,
    config::{Config, ConfigError},
    deployment::DeploymentError,
    http,
};
use thiserror::Error;
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::watch,
};
use tracing_subscriber::{EnvFilter, prelude::*};

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TaskManagerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] db::DbErr),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), TaskManagerError> {
    // A missing .env is fine; variables may come from the environment.
    let dotenv_path = dotenvy::dotenv().ok();

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,task_manager={level},db={level},tower_http={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)
        .map_err(|err| anyhow::anyhow!("Failed to create tracing filter: {err}"))?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if let Some(path) = dotenv_path {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let config = Config::from_env()?;
    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir)?;
    }
    let (host, port) = (config.host.clone(), config.port);

    let deployment = Deployment::new(config).await?;
    deployment.ensure_bootstrap_worker().await?;
    deployment.prune_expired_sessions().await?;

    let app_router = http::router(deployment.clone());

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    let signals = ShutdownSignals::install()?;

    let server = axum::serve(listener, app_router)
        .with_graceful_shutdown(signals.clone().received(1))
        .into_future();
    tokio::pin!(server);

    let serve_result = tokio::select! {
        res = &mut server => res,
        _ = signals.clone().received(2) => {
            tracing::warn!("Second shutdown signal, exiting without draining connections");
            std::process::exit(130);
        }
        _ = signals.clone().deadline(GRACEFUL_SHUTDOWN_TIMEOUT) => {
            tracing::warn!(
                timeout_secs = GRACEFUL_SHUTDOWN_TIMEOUT.as_secs(),
                "Connections still open at the shutdown deadline, exiting"
            );
            std::process::exit(130);
        }
    };

    serve_result?;

    // Sessions that expired while serving go now rather than at the next start.
    if let Err(err) = deployment.prune_expired_sessions().await {
        tracing::warn!(error = %err, "Failed to prune expired sessions on shutdown");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Counts SIGINT and SIGTERM deliveries. The first starts a graceful
/// shutdown, the second forces the process out.
#[derive(Clone)]
struct ShutdownSignals(watch::Receiver<u32>);

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let (tx, rx) = watch::channel(0);

        tokio::spawn(async move {
            let mut seen = 0;
            while seen < 2 {
                tokio::select! {
                    Some(()) = interrupt.recv() => {}
                    Some(()) = terminate.recv() => {}
                    else => break,
                }

                seen += 1;
                if seen == 1 {
                    tracing::info!("Shutting down, send the signal again to force");
                }
                tx.send_replace(seen);
            }
        });

        Ok(Self(rx))
    }

    /// Resolves once `count` signals have arrived. Never resolves if the
    /// listener is gone first.
    async fn received(mut self, count: u32) {
        let reached = self.0.wait_for(|seen| *seen >= count).await.is_ok();
        if !reached {
            std::future::pending::<()>().await;
        }
    }

    /// Resolves `timeout` after the first signal.
    async fn deadline(self, timeout: Duration) {
        self.received(1).await;
        tokio::time::sleep(timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::watch, time::timeout};

    use super::ShutdownSignals;

    const SHORT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn force_needs_a_second_signal() {
        let (tx, rx) = watch::channel(0);
        let signals = ShutdownSignals(rx);

        assert!(timeout(SHORT, signals.clone().received(1)).await.is_err());

        tx.send(1).unwrap();
        timeout(SHORT, signals.clone().received(1)).await.unwrap();
        assert!(timeout(SHORT, signals.clone().received(2)).await.is_err());

        tx.send(2).unwrap();
        timeout(SHORT, signals.received(2)).await.unwrap();
    }

    #[tokio::test]
    async fn deadline_runs_from_the_first_signal() {
        let (tx, rx) = watch::channel(0);
        let signals = ShutdownSignals(rx);
        let deadline = tokio::spawn(signals.deadline(Duration::from_millis(10)));

        tokio::time::sleep(SHORT).await;
        assert!(!deadline.is_finished());

        tx.send(1).unwrap();
        timeout(Duration::from_secs(1), deadline)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn closed_listener_never_triggers_shutdown() {
        let (tx, rx) = watch::channel(0);
        drop(tx);
        assert!(timeout(SHORT, ShutdownSignals(rx).received(1)).await.is_err());
    }
}
