mod routes;

use crate::config::ApiErrorPolicy;
use crate::error::{AppError, Result};
use crate::sheets::RowSource;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiny_http::{Header, Request, Response, Server};
use tracing::{Instrument, debug, info, info_span, warn};

/// Serves the data and index endpoints.
pub struct HttpServer<F> {
    server: Arc<Server>,
    source: Arc<F>,
    policy: ApiErrorPolicy,
    stopping: Arc<AtomicBool>,
}

/// Stops a running [`HttpServer`] from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    server: Arc<Server>,
    stopping: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.server.unblock();
    }
}

impl<F> HttpServer<F>
where
    F: RowSource + 'static,
{
    pub fn bind(addr: &str, source: F, policy: ApiErrorPolicy) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| AppError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self {
            server: Arc::new(server),
            source: Arc::new(source),
            policy,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server: Arc::clone(&self.server),
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Accept requests until shut down; each request runs on its own task
    pub async fn run(self) -> Result<()> {
        info!(addr = ?self.local_addr(), "Listening");

        loop {
            let server = Arc::clone(&self.server);
            let received = tokio::task::spawn_blocking(move || server.recv())
                .await
                .map_err(|e| AppError::Other(e.into()))?;

            let request = match received {
                Ok(request) => request,
                Err(_) if self.stopping.load(Ordering::SeqCst) => {
                    info!("Server stopped");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Failed to accept request");
                    continue;
                }
            };

            let source = Arc::clone(&self.source);
            let policy = self.policy;
            let span = info_span!(
                "Handling request",
                method = %request.method(),
                url = %request.url()
            );
            tokio::spawn(handle(request, source, policy).instrument(span));
        }
    }
}

async fn handle<F>(request: Request, source: Arc<F>, policy: ApiErrorPolicy)
where
    F: RowSource + ?Sized,
{
    let method = request.method().clone();
    let url = request.url().to_string();

    let reply = routes::dispatch(source.as_ref(), policy, &method, &url).await;
    debug!(status = reply.status, "Responding");

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response = response.with_header(header);
    }

    if let Err(e) = request.respond(response) {
        warn!(error = %e, "Failed to send response");
    }
}
