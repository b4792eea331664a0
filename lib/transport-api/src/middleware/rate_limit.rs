//! Rate limiting middleware.
//!
//! [`RateLimit`] asks a [`RateLimiter`] for permission before every request. If the
//! limiter refuses (the request context was cancelled, or its deadline cannot be met),
//! the inner service is never called and the limiter's error is returned as is.
//!
//! The default limiter, [`TokenBucket`], is a token bucket backed by `governor`:
//! `burst` tokens of capacity, refilled continuously at `rate` tokens per second.

use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use tower::{Layer, Service};

use crate::{Error, Request, RequestContext, Response, Result};

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Grants permission to proceed, one token at a time.
pub trait RateLimiter: Send + Sync + 'static {
    /// Wait until a token is available and consume it.
    ///
    /// # Errors
    ///
    /// Fails without consuming a token if `ctx` is cancelled or its deadline passes
    /// (or cannot be met) before a token becomes available.
    fn wait(&self, ctx: &RequestContext) -> impl Future<Output = Result<()>> + Send;
}

/// Token bucket limiter shared by every request that goes through it.
///
/// Clones share the same bucket.
///
/// Refill follows the wall clock (governor's default clock) while waits sleep on the
/// tokio timer. Under a paused tokio clock (`start_paused`, `time::pause`) a waiting
/// caller spins without the bucket ever refilling, so test code that needs a token
/// after the burst must run on real time.
///
/// # Example
///
/// ```ignore
/// use transport_api::middleware::TokenBucket;
///
/// // 10 requests per second, bursts of up to 5
/// let bucket = TokenBucket::new(10.0, 5)?;
/// ```
#[derive(Clone)]
pub struct TokenBucket {
    limiter: Arc<DirectLimiter>,
    clock: DefaultClock,
    rate: f64,
    burst: NonZeroU32,
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("rate", &self.rate)
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

impl TokenBucket {
    /// Create a bucket refilled at `rate` tokens per second, holding at most `burst`.
    ///
    /// The bucket starts full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `rate` is not a finite positive number,
    /// is too high to be represented, or if `burst` is zero.
    pub fn new(rate: f64, burst: u32) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::invalid_config(format!(
                "rate must be a positive number of tokens per second, got {rate}"
            )));
        }
        let burst = NonZeroU32::new(burst)
            .ok_or_else(|| Error::invalid_config("burst must be at least 1"))?;
        let quota = Duration::try_from_secs_f64(rate.recip())
            .ok()
            .and_then(Quota::with_period)
            .ok_or_else(|| Error::invalid_config(format!("rate {rate} is too high")))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(GovernorRateLimiter::direct(quota)),
            clock: DefaultClock::default(),
            rate,
            burst,
        })
    }

    /// Refill rate in tokens per second.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    #[must_use]
    pub const fn burst(&self) -> u32 {
        self.burst.get()
    }
}

impl RateLimiter for TokenBucket {
    async fn wait(&self, ctx: &RequestContext) -> Result<()> {
        loop {
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let delay = match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => not_until.wait_time_from(self.clock.now()),
            };

            if let Some(deadline) = ctx.deadline()
                && Instant::now().checked_add(delay).is_none_or(|at| at > deadline)
            {
                return Err(Error::rate_limited(format!(
                    "waiting {delay:?} for a token would exceed the context deadline"
                )));
            }

            // The token is claimed by `check` on the next turn; another caller may win it.
            tokio::select! {
                biased;
                err = ctx.done() => return Err(err),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Layer that applies rate limiting to requests.
///
/// Every service produced by one layer shares the same limiter.
///
/// # Example
///
/// ```ignore
/// use transport_api::middleware::RateLimitLayer;
///
/// // Allow 10 requests per second, bursts of 5
/// let layer = RateLimitLayer::token_bucket(10.0, 5)?;
/// ```
#[derive(Debug)]
pub struct RateLimitLayer<L> {
    limiter: Arc<L>,
}

impl<L> Clone for RateLimitLayer<L> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<L: RateLimiter> RateLimitLayer<L> {
    /// Create a layer around a custom limiter.
    pub fn new(limiter: L) -> Self {
        Self {
            limiter: Arc::new(limiter),
        }
    }
}

impl RateLimitLayer<TokenBucket> {
    /// Create a layer around a [`TokenBucket`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] on invalid `rate` or `burst`.
    pub fn token_bucket(rate: f64, burst: u32) -> Result<Self> {
        TokenBucket::new(rate, burst).map(Self::new)
    }
}

impl<S, L> Layer<S> for RateLimitLayer<L> {
    type Service = RateLimit<S, L>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimit {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service that applies rate limiting to requests.
#[derive(Debug)]
pub struct RateLimit<S, L> {
    inner: S,
    limiter: Arc<L>,
}

impl<S: Clone, L> Clone for RateLimit<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<S, L> Service<Request> for RateLimit<S, L>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    L: RateLimiter,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            limiter.wait(request.context()).await?;

            inner.call(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tower::ServiceExt;

    use super::*;
    use crate::Method;

    /// Mock service counting its calls.
    #[derive(Clone)]
    struct MockService {
        call_count: Arc<AtomicU32>,
    }

    impl MockService {
        fn new() -> Self {
            Self {
                call_count: Arc::new(AtomicU32::new(0)),
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Service<Request> for MockService {
        type Response = Response;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request) -> Self::Future {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Response::new(200, http::HeaderMap::new(), "")) })
        }
    }

    /// Limiter answering with a fixed outcome.
    struct FixedLimiter {
        refuse: bool,
    }

    impl RateLimiter for FixedLimiter {
        async fn wait(&self, _ctx: &RequestContext) -> Result<()> {
            if self.refuse {
                Err(Error::rate_limited("rate limit exceeded"))
            } else {
                Ok(())
            }
        }
    }

    fn request(ctx: RequestContext) -> Request {
        let url = url::Url::parse("https://mg.example.com/api/messages").expect("valid url");
        Request::builder(Method::POST, url).context(ctx).build()
    }

    #[tokio::test]
    async fn passes_when_limiter_allows() {
        let mock = MockService::new();
        let service = RateLimitLayer::new(FixedLimiter { refuse: false }).layer(mock.clone());

        let response = service
            .oneshot(request(RequestContext::new()))
            .await
            .expect("response");

        assert_eq!(response.status(), 200);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn fails_closed_when_limiter_refuses() {
        let mock = MockService::new();
        let service = RateLimitLayer::new(FixedLimiter { refuse: true }).layer(mock.clone());

        let result = service.oneshot(request(RequestContext::new())).await;

        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert_eq!(mock.call_count(), 0, "inner service must not be called");
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(TokenBucket::new(0.0, 1), Err(Error::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(-1.0, 1), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            TokenBucket::new(f64::NAN, 1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TokenBucket::new(f64::INFINITY, 1),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(TokenBucket::new(1.0, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn reports_parameters() {
        let bucket = TokenBucket::new(2.5, 4).expect("valid bucket");
        assert!((bucket.rate() - 2.5).abs() < f64::EPSILON);
        assert_eq!(bucket.burst(), 4);
    }

    #[tokio::test]
    async fn burst_then_refill() {
        let mock = MockService::new();
        let layer = RateLimitLayer::token_bucket(2.0, 2).expect("valid bucket");
        let service = layer.layer(mock.clone());

        for _ in 0..2 {
            let start = Instant::now();
            let result = service
                .clone()
                .oneshot(request(RequestContext::new()))
                .await;
            assert!(result.is_ok());
            assert!(
                start.elapsed() < Duration::from_millis(50),
                "burst requests should not wait, elapsed: {:?}",
                start.elapsed()
            );
        }

        let start = Instant::now();
        let result = service
            .clone()
            .oneshot(request(RequestContext::new()))
            .await;
        assert!(result.is_ok());
        assert!(
            start.elapsed() >= Duration::from_millis(400),
            "third request should wait for a refill, elapsed: {:?}",
            start.elapsed()
        );

        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn cancelled_context_fails_without_consuming() {
        let bucket = TokenBucket::new(1.0, 1).expect("valid bucket");
        let ctx = RequestContext::new();
        ctx.cancel();

        let result = bucket.wait(&ctx).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        // The single token is still there.
        let start = Instant::now();
        bucket.wait(&RequestContext::new()).await.expect("token");
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn cancellation_interrupts_wait() {
        let bucket = TokenBucket::new(0.5, 1).expect("valid bucket");
        bucket.wait(&RequestContext::new()).await.expect("first token");

        let ctx = RequestContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = bucket.wait(&ctx).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn unreachable_deadline_fails_fast() {
        let bucket = TokenBucket::new(1.0, 1).expect("valid bucket");
        bucket.wait(&RequestContext::new()).await.expect("first token");

        let ctx = RequestContext::new().with_timeout(Duration::from_millis(100));
        let start = Instant::now();
        let result = bucket.wait(&ctx).await;

        assert!(matches!(result, Err(Error::RateLimited(_))));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn concurrent_callers_never_double_spend() {
        let bucket = TokenBucket::new(1.0, 3).expect("valid bucket");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bucket = bucket.clone();
                tokio::spawn(async move {
                    let ctx = RequestContext::new().with_timeout(Duration::from_millis(200));
                    bucket.wait(&ctx).await.is_ok()
                })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.expect("task") {
                granted += 1;
            }
        }

        assert_eq!(granted, 3);
    }
}
