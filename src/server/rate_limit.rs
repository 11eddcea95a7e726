//! Per-client request rate limiting.
//!
//! Each client IP may make `limit` requests per `window`. Admission uses the
//! generic cell rate algorithm: a client is tracked by a single theoretical
//! arrival time that advances by `window / limit` per admitted request, so a
//! client can burst up to `limit` requests and then regains one slot every
//! `window / limit`.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::platform::get_header;

/// How often idle clients are forgotten.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct RateLimiter {
    limit: u32,
    window: Duration,
    emission_interval: Duration,
    clients: Mutex<HashMap<IpAddr, Instant>>,
}

impl RateLimiter {
    /// Allows `limit` requests per `window` for each client. A zero limit
    /// is treated as one.
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1);
        RateLimiter {
            limit,
            window,
            emission_interval: window / limit,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admits one request from `client`, or returns how long it must wait.
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        let arrival = clients.get(&client).copied().unwrap_or(now).max(now);
        let next = arrival + self.emission_interval;
        let horizon = now + self.window;
        if next > horizon {
            return Err(next - horizon);
        }

        clients.insert(client, next);
        Ok(())
    }

    /// Forgets clients whose allowance has fully recovered. Returns how
    /// many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, arrival| *arrival > now);
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Prunes idle clients periodically until `shutdown` fires.
    pub fn spawn_cleanup(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.prune();
                        debug!(removed, remaining = limiter.tracked_clients(), "Pruned rate limit state");
                    }
                }
            }
        })
    }
}

/// Resolves the client address: `X-Forwarded-For` (first hop), then
/// `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let forwarded = get_header(headers, "X-Forwarded-For")
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    forwarded
        .or_else(|| get_header(headers, "X-Real-IP").and_then(|v| v.trim().parse().ok()))
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Middleware answering 429 once a client exceeds its allowance.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer);

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!(client = %client, limit = limiter.limit(), "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": "too many requests, retry later"})),
            )
                .into_response();
            let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}
