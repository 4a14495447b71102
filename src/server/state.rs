use std::sync::Arc;
use std::time::Instant;

use rusqlite::Connection;
use tokio::sync::{Mutex, MutexGuard};

use super::rate_limit::RateLimiter;
use super::security::{SecurityPolicy, SessionStore};

pub struct AppState {
    store: Mutex<Connection>,
    pub sessions: SessionStore,
    pub limiter: RateLimiter,
    pub policy: SecurityPolicy,
    pub started: Instant,
}

impl AppState {
    pub fn new(connection: Connection, policy: SecurityPolicy) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(connection),
            sessions: SessionStore::new(policy.session_ttl),
            limiter: RateLimiter::new(policy.rate_limit),
            policy,
            started: Instant::now(),
        })
    }

    pub async fn db(&self) -> MutexGuard<'_, Connection> {
        self.store.lock().await
    }

    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
