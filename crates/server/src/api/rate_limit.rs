//! Per-client token bucket rate limiting.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

/// Buckets kept before idle (full) ones are pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Token bucket for a single client.
///
/// Tokens are added at a constant rate and consumed by requests. The bucket
/// starts full, allowing a burst up to the capacity.
#[derive(Debug)]
pub struct TokenBucket {
    /// Max tokens (= requests per window).
    capacity: f32,
    tokens: f32,
    /// Tokens added per second.
    refill_rate: f32,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, Duration::from_secs(60))
    }

    /// Bucket allowing `capacity` requests per `window`.
    pub fn with_window(capacity: u32, window: Duration) -> Self {
        let capacity = capacity as f32;
        Self {
            capacity,
            tokens: capacity,
            refill_rate: capacity / window.as_secs_f32(),
            last_refill: Instant::now(),
        }
    }

    /// Takes one token, or returns how long until one is available.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        let wait = self.wait_time();
        if wait.is_zero() {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(wait)
        }
    }

    /// Time until a token is available, zero if one is available now.
    fn wait_time(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let tokens_needed = 1.0 - self.tokens;
            Duration::from_secs_f32(tokens_needed / self.refill_rate)
        }
    }

    /// Whether the bucket has refilled completely.
    fn is_full(&mut self) -> bool {
        self.refill();
        self.tokens >= self.capacity
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f32();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

/// Window whose limit a client exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWindow {
    Minute,
    Hour,
}

impl std::fmt::Display for LimitWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minute => write!(f, "minute"),
            Self::Hour => write!(f, "hour"),
        }
    }
}

/// A request refused by [`ClientRateLimiter::check`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimited {
    pub window: LimitWindow,
    /// Requests allowed per window.
    pub limit: u32,
    /// Time until the client may retry.
    pub wait: Duration,
}

#[derive(Debug)]
struct ClientBuckets {
    minute: TokenBucket,
    hour: Option<TokenBucket>,
}

impl ClientBuckets {
    fn is_full(&mut self) -> bool {
        self.minute.is_full() && self.hour.as_mut().map_or(true, TokenBucket::is_full)
    }
}

/// Per-minute and per-hour [`TokenBucket`]s for each client address.
///
/// A request consumes a token from both buckets, and only when both have one.
pub struct ClientRateLimiter {
    requests_per_minute: u32,
    /// 0 disables the hourly limit.
    requests_per_hour: u32,
    buckets: Mutex<HashMap<IpAddr, ClientBuckets>>,
}

impl ClientRateLimiter {
    pub fn new(requests_per_minute: u32, requests_per_hour: u32) -> Self {
        Self {
            requests_per_minute,
            requests_per_hour,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn requests_per_hour(&self) -> u32 {
        self.requests_per_hour
    }

    /// Consumes a token for `client`.
    pub async fn check(&self, client: IpAddr) -> Result<(), RateLimited> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= MAX_TRACKED_CLIENTS && !buckets.contains_key(&client) {
            buckets.retain(|_, bucket| !bucket.is_full());
        }

        let client = buckets.entry(client).or_insert_with(|| ClientBuckets {
            minute: TokenBucket::new(self.requests_per_minute),
            hour: (self.requests_per_hour > 0).then(|| {
                TokenBucket::with_window(self.requests_per_hour, Duration::from_secs(3600))
            }),
        });

        let wait = client.minute.wait_time();
        if !wait.is_zero() {
            return Err(RateLimited {
                window: LimitWindow::Minute,
                limit: self.requests_per_minute,
                wait,
            });
        }

        if let Some(hour) = client.hour.as_mut() {
            let wait = hour.wait_time();
            if !wait.is_zero() {
                return Err(RateLimited {
                    window: LimitWindow::Hour,
                    limit: self.requests_per_hour,
                    wait,
                });
            }
            hour.tokens -= 1.0;
        }
        client.minute.tokens -= 1.0;

        Ok(())
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

/// Resolves the client address of a request.
///
/// Proxy headers (`X-Forwarded-For`, then `X-Real-IP`) are honored only when
/// the socket peer is loopback, i.e. a local reverse proxy. Loopback values
/// inside those headers are ignored. Any other peer is identified by its own
/// address, and requests without a peer share the unspecified address.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    let Some(peer) = peer else {
        return IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    };

    if !peer.is_loopback() {
        if headers.contains_key("x-forwarded-for") || headers.contains_key("x-real-ip") {
            debug!(peer = %peer, "Ignoring proxy headers from non-loopback peer");
        }
        return peer;
    }

    forwarded_ip(headers, "x-forwarded-for")
        .or_else(|| forwarded_ip(headers, "x-real-ip"))
        .unwrap_or(peer)
}

/// First address in a proxy header, skipping loopback values.
fn forwarded_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let ip: IpAddr = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())?;

    if ip.is_loopback() {
        warn!(header = name, value = %ip, "Rejected loopback address in proxy header");
        return None;
    }
    Some(ip)
}
