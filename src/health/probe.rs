// src/health/probe.rs
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// A single health check.
///
/// Implementations should watch `ctx` and bail out early once it is
/// cancelled; the orchestrator will not abort a probe on its behalf
/// unless it runs with [`Collection::FanIn`](crate::health::Collection).
///
/// `check` must not block the executor thread. Fan-in collection runs each
/// check in its own task so a blocking check still times out on a
/// multi-threaded runtime, but it keeps a worker busy until it returns and
/// on a current-thread runtime it stalls the whole measurement. Wrap
/// blocking work in `tokio::task::spawn_blocking`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, ctx: CancellationToken) -> anyhow::Result<()>;
}

/// Probe backed by an async closure.
pub struct FnProbe<F> {
    f: F,
}

/// Wrap a closure so it can be registered as a probe.
///
/// ```ignore
/// let probe = from_fn(|_ctx| async { anyhow::Ok(()) });
/// ```
pub fn from_fn<F, Fut>(f: F) -> FnProbe<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnProbe { f }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn check(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_probe_forwards_result() {
        let ok = from_fn(|_ctx| async { anyhow::Ok(()) });
        assert!(ok.check(CancellationToken::new()).await.is_ok());

        let failing = from_fn(|_ctx| async { Err::<(), _>(anyhow::anyhow!("db is down")) });
        let err = failing.check(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "db is down");
    }

    #[tokio::test]
    async fn test_fn_probe_sees_cancellation() {
        let probe = from_fn(|ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(anyhow::anyhow!("cancelled"))
        });

        let token = CancellationToken::new();
        token.cancel();
        assert!(probe.check(token).await.is_err());
    }
}
