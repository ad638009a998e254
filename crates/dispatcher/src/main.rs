use std::sync::Arc;

use anyhow::Context;

use snippetquiz_infra::DispatchConfig;
use snippetquiz_infra::bootstrap::{self, Stores};
use snippetquiz_infra::event_bus::{
    EventRouter, RedisPubSubTransport, RedisStreamsConnector, RedisStreamsTransport,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();
    snippetquiz_observability::init();

    let config = DispatchConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        consumer_group = %config.consumer_group,
        consumer_name = %config.consumer_name,
        "starting dispatcher"
    );

    let durable = RedisStreamsTransport::from_config(&config)?;
    let ephemeral = RedisPubSubTransport::new(&config.redis_url)?;
    let router = EventRouter::over(durable, ephemeral);

    let dispatch = bootstrap::build(Arc::new(router), &Stores::new())?;
    let connector = RedisStreamsConnector::from_config(&config)?;
    let mut consumer = dispatch.consumer(connector, config.poll_timeout);
    consumer.start().context("failed to start inbound consumer")?;

    shutdown_signal().await;

    // Joining the worker blocks until its current poll returns.
    tokio::task::spawn_blocking(move || consumer.stop())
        .await
        .context("consumer shutdown task failed")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
