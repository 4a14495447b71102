use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use super::rate_limit::{RateLimit, DEFAULT_MAX_REQUESTS};
use super::security::SecurityPolicy;

pub const DEFAULT_ORIGINS: [&str; 7] = [
    "https://cquizy.com",
    "https://www.cquizy.com",
    "http://cquizy.com",
    "http://www.cquizy.com",
    "http://127.0.0.1:5500",
    "http://localhost:3000",
    "http://localhost:5173",
];

fn default_origins() -> Vec<String> {
    DEFAULT_ORIGINS.iter().map(|origin| origin.to_string()).collect()
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "CQUIZY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite database holding the questions
    #[arg(short, long, value_name = "FILE", env = "CQUIZY_DB", default_value = "cquizy.db")]
    pub db: PathBuf,

    /// Secure cookies and strict same-site policy
    #[arg(long, env = "CQUIZY_PRODUCTION")]
    pub production: bool,

    /// Comma separated list of origins allowed to call the API
    #[arg(long, env = "CQUIZY_ALLOWED_ORIGINS", value_delimiter = ',', default_values_t = default_origins())]
    pub allowed_origins: Vec<String>,

    /// How long a session (and its CSRF token) lives
    #[arg(long, env = "CQUIZY_SESSION_HOURS", default_value_t = 24)]
    pub session_hours: u64,

    /// Requests one client address may make under /api per window (0 disables)
    #[arg(long, env = "CQUIZY_RATE_LIMIT", default_value_t = DEFAULT_MAX_REQUESTS)]
    pub rate_limit: u32,

    /// Length of the rate limit window
    #[arg(long, env = "CQUIZY_RATE_WINDOW_MINUTES", default_value_t = 15)]
    pub rate_window_minutes: u64,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn policy(&self) -> SecurityPolicy {
        SecurityPolicy::new(
            self.production,
            &self.allowed_origins,
            Duration::from_secs(self.session_hours * 60 * 60),
        )
        .with_rate_limit(RateLimit {
            max_requests: self.rate_limit,
            window: Duration::from_secs(self.rate_window_minutes * 60),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            db: PathBuf::from("cquizy.db"),
            production: false,
            allowed_origins: default_origins(),
            session_hours: 24,
            rate_limit: DEFAULT_MAX_REQUESTS,
            rate_window_minutes: 15,
        }
    }
}
