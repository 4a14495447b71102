//! Fixed-window request limit per client address for everything under `/api`.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderMap},
    middleware::Next,
    response::Response,
};
use log::{debug, warn};
use tokio::sync::Mutex;

use super::error::AppError;
use super::state::AppState;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

const FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Zero turns the limiter off.
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

struct Window {
    started: Instant,
    requests: u32,
}

pub struct RateLimiter {
    limit: RateLimit,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request from `client`. `Err` carries the seconds until its
    /// window resets.
    pub async fn check(&self, client: &str, now: Instant) -> Result<(), u64> {
        if self.limit.max_requests == 0 {
            return Ok(());
        }
        let window = self.limit.window;
        let mut clients = self.clients.lock().await;

        if !clients.contains_key(client) {
            clients.retain(|_, entry| now.duration_since(entry.started) < window);
        }
        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            requests: 0,
        });
        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.requests = 0;
        }

        if entry.requests >= self.limit.max_requests {
            let remaining = window.saturating_sub(now.duration_since(entry.started));
            return Err(remaining.as_secs().max(1));
        }
        entry.requests += 1;
        Ok(())
    }
}

/// The peer address when the server was started with connect info, else the
/// first `X-Forwarded-For` entry.
fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(address)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return address.ip().to_string();
    }
    forwarded_for(request.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_key(&request);
    match state.limiter.check(&client, Instant::now()).await {
        Ok(()) => Ok(next.run(request).await),
        Err(retry_after) => {
            warn!(
                "[Security] Rate limit hit by {} on {}",
                client,
                request.uri().path()
            );
            debug!("[Security] {} may retry in {}s", client, retry_after);
            Err(AppError::RateLimited(retry_after))
        }
    }
}
