//! HTTP listener.
//!
//! `PipeServer` binds a TCP port and hands every request to the router.
//! One tokio task per connection, HTTP/1.1; receivers and senders on the
//! same path may arrive on any two connections and are paired by the
//! shared registry.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::handler::{ServerState, handle};

/// The pipe server: a listener address plus the shared state every
/// connection routes against.
pub struct PipeServer {
    bind_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl PipeServer {
    pub fn new(bind_addr: SocketAddr, state: Arc<ServerState>) -> Self {
        Self { bind_addr, state }
    }

    /// Run until the shutdown signal flips.
    ///
    /// In-flight transfers are not drained on shutdown; a relay with no
    /// storage has nothing to persist.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .context("failed to bind pipe server")?;

        info!(addr = %self.bind_addr, "pipe server listening");

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, peer_addr) = accept_result.context("accept failed")?;
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let svc = service_fn(move |req| {
                            let state = state.clone();
                            async move { Ok::<_, hyper::Error>(handle(state, req).await) }
                        });

                        if let Err(e) = http1::Builder::new()
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(%peer_addr, error = %e, "connection error");
                        }
                    });
                }
                _ = shutdown.changed() => {
                    info!("pipe server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
