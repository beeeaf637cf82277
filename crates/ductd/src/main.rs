//! ductd — the duct daemon.
//!
//! Binds the HTTP listener and serves the pipe relay until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! ductd --http-port 8080
//! ```

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use duct_server::{PipeServer, ServerState};

#[derive(Parser)]
#[command(name = "ductd", version, about = "Stream bytes between any two HTTP clients")]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// HTTP port to listen on.
    #[arg(long, default_value = "8080")]
    http_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,ductd=debug,duct_core=debug,duct_relay=debug,duct_server=debug"
                        .parse()
                        .unwrap()
                }),
        )
        .init();

    let cli = Cli::parse();

    info!(version = env!("CARGO_PKG_VERSION"), "ductd starting");

    let state = ServerState::new();
    let addr = SocketAddr::new(cli.host, cli.http_port);
    let server = PipeServer::new(addr, state);

    // Graceful shutdown on Ctrl-C.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.serve(shutdown_rx).await?;

    info!("ductd stopped");
    Ok(())
}
