// src/server/builder.rs
use crate::server::listener::bind_tcp;
use hyper::{server::conn::Http, Body, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::Service;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no handler configured, call with_handler() first")]
    MissingHandler,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[from] std::io::Error),
}

/// Accept loop serving one handler until the shutdown token fires.
pub struct ServerBuilder<H> {
    addr: SocketAddr,
    handler: Option<H>,
    shutdown: CancellationToken,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>, Error = Infallible>
        + Send
        + Clone
        + 'static,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Bind the configured address and serve.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = bind_tcp(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener.
    ///
    /// Once the shutdown token fires no new connections are accepted; open
    /// ones finish the request in flight and are closed before this returns.
    pub async fn serve_on(self, listener: TcpListener) -> Result<(), ServerError> {
        let handler = self.handler.ok_or(ServerError::MissingHandler)?;
        let local = listener.local_addr()?;
        tracing::info!("HTTP server listening on {}", local);

        let mut connections = JoinSet::new();
        loop {
            let (stream, peer) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(_) = connections.join_next() => continue,
                accepted = listener.accept() => accepted?,
            };
            let svc = handler.clone();
            let shutdown = self.shutdown.clone();

            connections.spawn(async move {
                let conn = Http::new().serve_connection(stream, svc);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = shutdown.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        conn.as_mut().await
                    }
                };
                if let Err(err) = result {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }

        tracing::info!(
            "HTTP server on {} shutting down, draining {} connections",
            local,
            connections.len()
        );
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}
