use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use alloy::{
    providers::{ProviderBuilder, RootProvider},
    rpc::{
        client::ClientBuilder,
        json_rpc::{RequestPacket, ResponsePacket},
    },
    transports::{http::ReqwestTransport, TransportError},
};
use tower::{retry::Policy, Layer, Service};
use tracing::warn;

/// Retries failed transport calls a bounded number of times, sleeping a fixed
/// backoff between attempts.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    backoff: Duration,
    retries: u32,
    max_retries: u32,
}

impl RetryPolicy {
    pub const fn new(backoff: Duration, max_retries: u32) -> Self {
        Self {
            backoff,
            retries: 0,
            max_retries,
        }
    }

    /// Number of retries performed so far.
    pub const fn retries(&self) -> u32 {
        self.retries
    }
}

impl Policy<RequestPacket, ResponsePacket, TransportError> for RetryPolicy {
    type Future = Pin<Box<dyn Future<Output = Self> + Send + 'static>>;

    fn retry(
        &self,
        _req: &RequestPacket,
        result: Result<&ResponsePacket, &TransportError>,
    ) -> Option<Self::Future> {
        let err = result.err()?;
        if self.retries >= self.max_retries {
            return None;
        }

        warn!(
            "RPC call failed ({}), retry {}/{} in {:?}",
            err,
            self.retries + 1,
            self.max_retries,
            self.backoff
        );

        let mut policy = self.clone();
        Some(Box::pin(async move {
            tokio::time::sleep(policy.backoff).await;
            policy.retries += 1;
            policy
        }))
    }

    fn clone_request(&self, req: &RequestPacket) -> Option<RequestPacket> {
        Some(req.clone())
    }
}

/// The policy doubles as the layer that installs it on a transport.
impl<S> Layer<S> for RetryPolicy {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: self.clone(),
        }
    }
}

/// Transport wrapper that replays failed requests according to a
/// [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct RetryService<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Service<RequestPacket> for RetryService<S>
where
    S: Service<RequestPacket, Response = ResponsePacket, Error = TransportError>
        + Send
        + 'static
        + Clone,
    S::Future: Send + 'static,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RequestPacket) -> Self::Future {
        // The clone may not be ready, so the ready service is taken and the
        // clone is left in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mut policy = self.policy.clone();

        Box::pin(async move {
            let mut res = inner.call(req.clone()).await;

            while let Some(next) = policy.retry(&req, res.as_ref()) {
                policy = next.await;
                res = inner.call(req.clone()).await;
            }

            res
        })
    }
}

/// An HTTP JSON-RPC provider whose transport retries failed calls.
pub fn build_http_retry_provider(
    rpc_url: url::Url,
    backoff: Duration,
    max_retries: u32,
) -> RootProvider<RetryService<ReqwestTransport>> {
    let client = ClientBuilder::default()
        .layer(RetryPolicy::new(backoff, max_retries))
        .http(rpc_url);

    ProviderBuilder::new().on_client(client)
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use alloy::transports::TransportErrorKind;

    use super::*;

    #[tokio::test]
    async fn failures_are_retried_up_to_the_limit() {
        let req = RequestPacket::Batch(Vec::new());
        let err = TransportErrorKind::custom_str("connection reset");

        let mut policy = RetryPolicy::new(Duration::ZERO, 2);
        for expected in 1..=2 {
            policy = policy.retry(&req, Err(&err)).unwrap().await;
            assert_eq!(policy.retries(), expected);
        }

        assert!(policy.retry(&req, Err(&err)).is_none());
    }

    #[test]
    fn successes_are_not_retried() {
        let req = RequestPacket::Batch(Vec::new());
        let res = ResponsePacket::Batch(Vec::new());

        let policy = RetryPolicy::new(Duration::ZERO, 5);
        assert!(policy.retry(&req, Ok(&res)).is_none());
        assert!(policy.clone_request(&req).is_some());
    }

    /// Fails the first `failures` calls, then answers with an empty batch.
    #[derive(Clone)]
    struct FlakyTransport {
        calls: Arc<AtomicU32>,
        failures: u32,
    }

    impl Service<RequestPacket> for FlakyTransport {
        type Response = ResponsePacket;
        type Error = TransportError;
        type Future = Pin<Box<dyn Future<Output = Result<ResponsePacket, TransportError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: RequestPacket) -> Self::Future {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let failures = self.failures;

            Box::pin(async move {
                match call < failures {
                    true => Err(TransportErrorKind::custom_str("node unavailable")),
                    false => Ok(ResponsePacket::Batch(Vec::new())),
                }
            })
        }
    }

    #[tokio::test]
    async fn layered_transport_replays_failed_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let transport = FlakyTransport {
            calls: calls.clone(),
            failures: 2,
        };

        let mut service = RetryPolicy::new(Duration::ZERO, 2).layer(transport.clone());
        assert!(service.call(RequestPacket::Batch(Vec::new())).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        calls.store(0, Ordering::SeqCst);
        let mut service = RetryPolicy::new(Duration::ZERO, 1).layer(transport);
        assert!(service.call(RequestPacket::Batch(Vec::new())).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
