//! recordlink server - in-memory reference server.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recordlink_server::{create_transport, Args, RequestHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recordlink_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        protocol_version = recordlink_proto::PROTOCOL_VERSION,
        "starting recordlink server"
    );

    let config = Args::parse().into_config();
    tracing::info!(
        company_db = %config.company_db,
        server_id = %config.server_id,
        tcp_address = ?config.tcp_address,
        ipc_address = ?config.ipc_address,
        seed = ?config.seed,
        "configuration loaded"
    );

    let handler = Arc::new(RequestHandler::from_config(config.clone())?);
    let transport = create_transport(&config, handler)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            // Hold the sender so the transport keeps serving.
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    tracing::info!("server ready, accepting connections");
    if let Err(e) = transport.run_until_shutdown(shutdown_rx).await {
        tracing::error!(error = %e, "server error");
        return Err(e.into());
    }
    tracing::info!("server shutdown complete");

    Ok(())
}
