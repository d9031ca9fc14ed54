//! Per-client request throttling.
//!
//! [`RateLimiter`] keeps a sliding window of request instants per client
//! IP. [`RateLimitLayer`] puts one in front of a route: over-quota requests
//! are answered with [`ApiError::RateLimited`] (429 plus `Retry-After`)
//! without reaching the handler.
//!
//! The client IP comes from axum's [`ConnectInfo`], so the server must be
//! started with `into_make_service_with_connect_info::<SocketAddr>()`.
//! Requests without connect info share a single bucket.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::response::{IntoResponse, Response};
use tower::{Layer, Service};

use crate::error::ApiError;

/// Clients tracked at once unless configured otherwise.
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

/// Quota for one [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests a client may make within `window`.
    pub max_requests: u32,
    /// Sliding window length.
    pub window: Duration,
    /// Hard cap on distinct clients held in memory. A new client arriving
    /// at the cap is rejected unless expired entries can be dropped.
    pub max_tracked_clients: usize,
}

impl RateLimitConfig {
    /// `max_requests` per `window`, tracking up to
    /// [`DEFAULT_MAX_TRACKED_CLIENTS`] clients.
    #[must_use]
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            max_tracked_clients: DEFAULT_MAX_TRACKED_CLIENTS,
        }
    }
}

/// Sliding-window request counter keyed by client IP.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The quota this limiter enforces.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Records a request from `client` if it is within quota.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RateLimited`] with the seconds until the oldest
    /// counted request leaves the window.
    pub fn check(&self, client: IpAddr) -> Result<(), ApiError> {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> Result<(), ApiError> {
        let window = self.config.window;
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if !clients.contains_key(&client) && clients.len() >= self.config.max_tracked_clients {
            clients.retain(|_, hits| {
                expire(hits, now, window);
                !hits.is_empty()
            });
            if clients.len() >= self.config.max_tracked_clients {
                tracing::warn!(%client, tracked = clients.len(), "rate limiter full; rejecting new client");
                return Err(ApiError::RateLimited {
                    retry_after_secs: whole_secs(window),
                });
            }
        }

        let hits = clients.entry(client).or_default();
        expire(hits, now, window);
        let quota = usize::try_from(self.config.max_requests).unwrap_or(usize::MAX);
        if hits.len() >= quota {
            let wait = hits.front().map_or(window, |&oldest| {
                window.saturating_sub(now.saturating_duration_since(oldest))
            });
            tracing::warn!(%client, requests = hits.len(), "rate limit exceeded");
            return Err(ApiError::RateLimited {
                retry_after_secs: whole_secs(wait),
            });
        }
        hits.push_back(now);
        Ok(())
    }

    /// Number of clients currently held in memory.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn expire(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while hits
        .front()
        .is_some_and(|&t| now.saturating_duration_since(t) >= window)
    {
        hits.pop_front();
    }
}

/// Rounds up to whole seconds, never below one.
fn whole_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}

fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| {
            addr.ip()
        })
}

/// Applies a shared [`RateLimiter`] to the wrapped service.
#[derive(Debug, Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    /// Wraps services with `limiter`.
    #[must_use]
    pub const fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`RateLimitLayer`].
#[derive(Debug, Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        match self.limiter.check(client_ip(&request)) {
            Ok(()) => Box::pin(self.inner.call(request)),
            Err(rejection) => Box::pin(std::future::ready(Ok(rejection.into_response()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    const PILOT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const OTHER: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(max_requests, Duration::from_secs(60)))
    }

    #[test]
    fn rejects_past_quota_with_time_to_oldest_expiry() {
        let limiter = limiter(2);
        let start = Instant::now();
        assert!(limiter.check_at(PILOT, start).is_ok());
        assert!(limiter.check_at(PILOT, start + Duration::from_secs(20)).is_ok());
        assert!(matches!(
            limiter.check_at(PILOT, start + Duration::from_secs(30)),
            Err(ApiError::RateLimited {
                retry_after_secs: 30
            })
        ));
    }

    #[test]
    fn window_slides() {
        let limiter = limiter(1);
        let start = Instant::now();
        assert!(limiter.check_at(PILOT, start).is_ok());
        assert!(limiter.check_at(PILOT, start + Duration::from_secs(59)).is_err());
        assert!(limiter.check_at(PILOT, start + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn rejected_requests_do_not_extend_the_window() {
        let limiter = limiter(1);
        let start = Instant::now();
        assert!(limiter.check_at(PILOT, start).is_ok());
        for secs in [10, 20, 30] {
            assert!(limiter.check_at(PILOT, start + Duration::from_secs(secs)).is_err());
        }
        assert!(limiter.check_at(PILOT, start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn clients_have_separate_quotas() {
        let limiter = limiter(1);
        let now = Instant::now();
        assert!(limiter.check_at(PILOT, now).is_ok());
        assert!(limiter.check_at(PILOT, now).is_err());
        assert!(limiter.check_at(OTHER, now).is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn tracked_clients_are_capped() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_clients: 1,
            ..RateLimitConfig::new(5, Duration::from_secs(60))
        });
        let start = Instant::now();
        assert!(limiter.check_at(PILOT, start).is_ok());
        assert!(limiter.check_at(OTHER, start).is_err());
        assert!(limiter.check_at(PILOT, start).is_ok());

        // Once the first client's hits expire its slot is reclaimed.
        assert!(limiter.check_at(OTHER, start + Duration::from_secs(60)).is_ok());
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(whole_secs(Duration::from_millis(1500)), 2);
        assert_eq!(whole_secs(Duration::from_secs(3)), 3);
        assert_eq!(whole_secs(Duration::ZERO), 1);
    }
}
