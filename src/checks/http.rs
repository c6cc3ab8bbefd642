// src/checks/http.rs
use crate::health::Probe;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra validation of the response body.
pub type ResponseCheck = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Checks that a remote service answers at `url` with a status below 500.
#[derive(Clone)]
pub struct HttpProbe {
    url: String,
    request_timeout: Duration,
    check_response: Option<ResponseCheck>,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            check_response: None,
            client: Client::new(),
        }
    }

    /// Zero keeps the default of five seconds.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        if !request_timeout.is_zero() {
            self.request_timeout = request_timeout;
        }
        self
    }

    pub fn with_response_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) -> Result<()> + Send + Sync + 'static,
    {
        self.check_response = Some(Arc::new(check));
        self
    }

    /// Fail unless the body contains `needle`.
    pub fn expect_body(self, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        self.with_response_check(move |body| {
            if body.contains(&needle) {
                Ok(())
            } else {
                Err(anyhow!("response body does not contain {:?}", needle))
            }
        })
    }

    async fn request(&self) -> Result<()> {
        let request = self
            .client
            .get(&self.url)
            // Ask the remote side to close the connection once answered.
            .header(header::CONNECTION, "close")
            .build()
            .context("creating the request for the health check failed")?;

        let response = timeout(self.request_timeout, self.client.execute(request))
            .await
            .map_err(|_| anyhow!("request timed out after {:?}", self.request_timeout))
            .context("making the request for the health check failed")?
            .context("making the request for the health check failed")?;

        let status = response.status();
        debug!("Health check request to {} returned {}", self.url, status);

        if status.is_server_error() {
            return Err(anyhow!("remote service is not available at the moment"));
        }

        if let Some(check) = &self.check_response {
            let body = response
                .text()
                .await
                .context("reading the health check response failed")?;
            return check(&body);
        }

        Ok(())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, ctx: CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(anyhow!("health check cancelled")),
            result = self.request() => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("connection", "close")
            .with_status(200)
            .create_async()
            .await;

        let probe = HttpProbe::new(format!("{}/health", server.url()));
        probe.check(CancellationToken::new()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_error_is_healthy() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(404).create_async().await;

        let probe = HttpProbe::new(server.url());
        assert!(probe.check(CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_server_error_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/").with_status(503).create_async().await;

        let probe = HttpProbe::new(server.url());
        let err = probe.check(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "remote service is not available at the moment");
    }

    #[tokio::test]
    async fn test_response_check() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(r#"{"status":"green"}"#)
            .expect(2)
            .create_async()
            .await;

        let green = HttpProbe::new(server.url()).expect_body("green");
        assert!(green.check(CancellationToken::new()).await.is_ok());

        let red = HttpProbe::new(server.url()).expect_body("red");
        let err = red.check(CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("does not contain"));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let probe = HttpProbe::new("not a url");
        let err = probe.check(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "creating the request for the health check failed");
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let probe = HttpProbe::new("http://127.0.0.1:1/health")
            .with_request_timeout(Duration::from_millis(500));
        let err = probe.check(CancellationToken::new()).await.unwrap_err();
        assert!(format!("{:#}", err).starts_with("making the request for the health check failed"));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let token = CancellationToken::new();
        token.cancel();

        let probe = HttpProbe::new("http://127.0.0.1:1/health");
        let err = probe.check(token).await.unwrap_err();
        assert_eq!(err.to_string(), "health check cancelled");
    }
}
