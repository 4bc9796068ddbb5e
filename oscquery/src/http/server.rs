use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use shared::error::{Error, Result};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::http::MiddlewarePipeline;

/// A running HTTP listener bound to one address.
///
/// Dropping the server stops accepting connections; requests already in
/// flight are allowed to finish.
pub struct HttpServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpServer {
    /// Binds `addr` and spawns the accept loop on `runtime`.
    pub fn start(
        addr: SocketAddr,
        pipeline: Arc<MiddlewarePipeline>,
        runtime: &Handle,
    ) -> Result<Self> {
        // binding registers the listener with the reactor
        let _guard = runtime.enter();
        let builder = Server::try_bind(&addr).map_err(|e| Error::Http(e.to_string()))?;

        let make_svc = make_service_fn(move |conn: &AddrStream| {
            let pipeline = Arc::clone(&pipeline);
            let remote_addr = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let pipeline = Arc::clone(&pipeline);
                    async move { Ok::<_, Infallible>(pipeline.serve(req, remote_addr).await) }
                }))
            }
        });

        let server = builder.serve(make_svc);
        let local_addr = server.local_addr();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = runtime.spawn(async move {
            if let Err(err) = graceful.await {
                log::error!("HTTP server error: {err}");
            }
            log::debug!("HTTP server on {local_addr} stopped");
        });
        log::info!("HTTP server listening on http://{local_addr}");

        Ok(HttpServer {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Stops accepting connections. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            log::debug!("Stopping HTTP server on {}", self.local_addr);
            let _ = tx.send(());
        }
    }

    /// Stops the server and waits for the accept loop to wind down.
    pub async fn stop(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            log::warn!("HTTP server task ended abnormally: {err}");
        }
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
