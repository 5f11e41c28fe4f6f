//! Sliding-window request limiter, keyed by client IP.
//!
//! Sits in front of every route. Each key holds the timestamps of its
//! requests inside the current window; a key's stamps are pruned lazily on
//! its next check, and at most once per window a full sweep drops keys with
//! no live stamps. There is no background sweeper task, and the map only
//! ever holds recently-seen clients.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::TransportError;

/// Per-client sliding-window limiter.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    state: Mutex<LimiterState>,
}

struct LimiterState {
    hits: HashMap<IpAddr, Vec<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window` per client.
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(LimiterState {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Record a request from `key` and report whether it is allowed.
    pub fn check(&self, key: IpAddr) -> bool {
        self.check_at(key, Instant::now())
    }

    /// `check` against an explicit clock reading.
    pub fn check_at(&self, key: IpAddr, now: Instant) -> bool {
        let window = self.window;
        let mut state = self.state.lock();
        if now.duration_since(state.last_sweep) >= window {
            state.last_sweep = now;
            // Keys whose clients never come back are only dropped here.
            state.hits.retain(|_, stamps| {
                stamps.retain(|stamp| now.duration_since(*stamp) < window);
                !stamps.is_empty()
            });
        }
        let stamps = state.hits.entry(key).or_default();
        stamps.retain(|stamp| now.duration_since(*stamp) < window);
        if stamps.len() >= self.max_requests {
            return false;
        }
        stamps.push(now);
        true
    }

    /// Number of client keys currently tracked.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.state.lock().hits.len()
    }
}

/// Axum middleware enforcing the limiter on every request.
///
/// The key is the peer address recorded by `into_make_service_with_connect_info`;
/// requests without one (in-process test clients) share the loopback budget.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |info| info.0.ip());

    if !limiter.check(client) {
        warn!(%client, "rate limit exceeded");
        return TransportError::RateLimited.into_response();
    }
    next.run(request).await
}

// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT_A: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const CLIENT_B: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn allows_up_to_the_budget() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(CLIENT_A, now));
        assert!(limiter.check_at(CLIENT_A, now));
        assert!(limiter.check_at(CLIENT_A, now));
        assert!(!limiter.check_at(CLIENT_A, now));
    }

    #[test]
    fn budget_frees_up_after_the_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(CLIENT_A, start));
        assert!(limiter.check_at(CLIENT_A, start));
        assert!(!limiter.check_at(CLIENT_A, start));

        // Exactly one window later the old stamps are out of range.
        let later = start + Duration::from_secs(60);
        assert!(limiter.check_at(CLIENT_A, later));
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(CLIENT_A, start));
        assert!(limiter.check_at(CLIENT_A, start + Duration::from_secs(30)));

        // The first stamp has aged out, the second has not.
        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(CLIENT_A, later));
        assert!(!limiter.check_at(CLIENT_A, later));
    }

    #[test]
    fn clients_have_independent_budgets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.check_at(CLIENT_A, now));
        assert!(!limiter.check_at(CLIENT_A, now));
        assert!(limiter.check_at(CLIENT_B, now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn denied_requests_do_not_consume_budget() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(CLIENT_A, start));
        assert!(!limiter.check_at(CLIENT_A, start + Duration::from_secs(30)));

        // The denied attempt left no stamp, so the slot reopens when the
        // first request ages out.
        assert!(limiter.check_at(CLIENT_A, start + Duration::from_secs(60)));
    }

    #[test]
    fn stale_clients_are_swept_out() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();
        for a in 0..=3_u8 {
            for b in 0..=255_u8 {
                let key = IpAddr::V4(Ipv4Addr::new(10, 1, a, b));
                assert!(limiter.check_at(key, start));
            }
        }
        assert_eq!(limiter.tracked_clients(), 1024);

        // Two windows on, every one of those stamps has aged out. The next
        // check sweeps the dead keys out rather than adding a 1025th.
        assert!(limiter.check_at(CLIENT_A, start + Duration::from_secs(120)));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn sweep_spares_clients_inside_the_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at(CLIENT_A, start + Duration::from_secs(30)));

        // B's check lands a full window after construction and triggers the
        // sweep; A's stamp is thirty seconds old and survives it.
        assert!(limiter.check_at(CLIENT_B, start + Duration::from_secs(60)));
        assert_eq!(limiter.tracked_clients(), 2);
        assert!(!limiter.check_at(CLIENT_A, start + Duration::from_secs(61)));
    }
}
