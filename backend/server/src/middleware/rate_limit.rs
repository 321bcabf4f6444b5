use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use crate::{error::AppError, state::AppState};

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
struct Windows {
    per_ip: HashMap<IpAddr, Window>,
    last_cleanup: Instant,
}

impl Windows {
    // Drops windows that have fully expired, at most once per window length.
    fn cleanup(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.last_cleanup) < window {
            return;
        }

        self.last_cleanup = now;
        self.per_ip
            .retain(|_, entry| now.duration_since(entry.started) < window);
    }
}

/// Fixed-window request counter per client IP.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: u32,
    inner: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max: max.max(1),
            inner: Mutex::new(Windows {
                per_ip: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Remaining requests in the current window, or `None` once exhausted.
    pub fn allow(&self, now: Instant, client_ip: IpAddr) -> Option<u32> {
        let Ok(mut windows) = self.inner.lock() else {
            error!("Rate limiter lock poisoned, denying request");
            return None;
        };

        windows.cleanup(now, self.window);

        let entry = windows.per_ip.entry(client_ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.max {
            entry.count += 1;
            Some(self.max - entry.count)
        } else {
            None
        }
    }
}

fn client_ip(req: &Request<Body>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(req.headers()) {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

// Only the entry appended by the nearest proxy is trusted; anything left of it came from the client.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .rsplit(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let client_ip = client_ip(&req, state.config.trust_proxy);
    let limiter = &state.rate_limiter;

    let Some(remaining) = limiter.allow(Instant::now(), client_ip) else {
        debug!(%client_ip, max = limiter.max(), "Rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    };

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", HeaderValue::from(limiter.max()));
    headers.insert("ratelimit-remaining", HeaderValue::from(remaining));

    response
}
