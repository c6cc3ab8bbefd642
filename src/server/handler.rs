// src/server/handler.rs
use hyper::{header, Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::health::{Health, Status};
use crate::metrics::MetricsRegistry;

pub const LIVENESS_PATH: &str = "/liveness";
pub const READINESS_PATH: &str = "/readiness";

/// Routes liveness, readiness and (optionally) metrics requests.
#[derive(Clone)]
pub struct HealthHandler {
    health: Arc<Health>,
    metrics: Option<(Arc<MetricsRegistry>, Arc<str>)>,
    shutdown: CancellationToken,
}

impl HealthHandler {
    pub fn new(health: Arc<Health>) -> Self {
        Self {
            health,
            metrics: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Serve the Prometheus registry under `path`.
    pub fn with_metrics(mut self, registry: Arc<MetricsRegistry>, path: impl Into<String>) -> Self {
        self.metrics = Some((registry, Arc::from(path.into())));
        self
    }

    /// Token handed to checks; cancelled when the server shuts down.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        if req.method() != Method::GET {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        match req.uri().path() {
            LIVENESS_PATH => json(StatusCode::OK, &self.health.liveness()),
            READINESS_PATH => {
                let ctx = self.shutdown.child_token();
                let report = self.health.measure(&ctx).await;
                let code = if report.status == Status::Unavailable {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::OK
                };
                json(code, &report)
            }
            path => match &self.metrics {
                Some((registry, metrics_path)) if path == &**metrics_path => {
                    match registry.gather() {
                        Ok(body) => Response::builder()
                            .status(StatusCode::OK)
                            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                            .body(Body::from(body))
                            .unwrap(),
                        Err(e) => {
                            tracing::error!(%e, "failed to encode metrics");
                            plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                        }
                    }
                }
                _ => plain(StatusCode::NOT_FOUND, "Not Found"),
            },
        }
    }
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(data) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(data))
            .unwrap(),
        Err(e) => {
            tracing::error!(%e, "failed to serialize health report");
            plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn plain(status: StatusCode, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(message.to_string()))
        .unwrap()
}

impl Service<Request<Body>> for HealthHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}
