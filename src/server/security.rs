//! Origin policy, response hardening headers, cookie sessions and CSRF checks.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        request::Parts,
        Method,
    },
    middleware::Next,
    response::Response,
};
use log::{debug, warn};
use rand::{rng, Rng};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::error::AppError;
use super::rate_limit::RateLimit;
use super::state::AppState;
use crate::libcquizy::api::CSRF_HEADER;

pub const SESSION_COOKIE: &str = "cquizy.sid";
/// Live sessions kept at once; the one closest to expiry goes first.
pub const MAX_SESSIONS: usize = 10_000;
const CSRF_HEADERS: [&str; 3] = [CSRF_HEADER, "csrf-token", "x-xsrf-token"];

/// Strips the scheme and a leading `www.` so that `https://www.a.com` and
/// `http://a.com` compare equal.
pub fn normalize_origin(origin: &str) -> String {
    let origin = origin.trim().trim_end_matches('/').to_lowercase();
    let origin = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(&origin);
    origin.strip_prefix("www.").unwrap_or(origin).to_string()
}

#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub production: bool,
    pub allowed_origins: Vec<String>,
    pub session_ttl: Duration,
    pub rate_limit: RateLimit,
}

impl SecurityPolicy {
    pub fn new(production: bool, allowed_origins: &[String], session_ttl: Duration) -> Self {
        Self {
            production,
            allowed_origins: allowed_origins
                .iter()
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            session_ttl,
            rate_limit: RateLimit::default(),
        }
    }

    pub fn with_rate_limit(self, rate_limit: RateLimit) -> Self {
        Self { rate_limit, ..self }
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.allowed_origins
            .iter()
            .any(|allowed| normalize_origin(allowed) == origin)
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let policy = self.clone();
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            let allowed = origin
                .to_str()
                .map(|origin| policy.origin_allowed(origin))
                .unwrap_or(false);
            if !allowed {
                warn!("[Security] CORS blocked request from origin: {:?}", origin);
            }
            allowed
        });

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_credentials(true)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
                header::ORIGIN,
                HeaderName::from_static("x-requested-with"),
                HeaderName::from_static(CSRF_HEADER),
            ])
            .max_age(Duration::from_secs(60 * 60))
    }

    fn content_security_policy(&self) -> String {
        let connect: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|origin| {
                if origin.starts_with("http") {
                    origin.clone()
                } else {
                    format!("https://{origin}")
                }
            })
            .collect();

        format!(
            "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; \
             img-src 'self' data:; connect-src 'self' {}; font-src 'self'; object-src 'none'; \
             media-src 'self'; frame-src 'none'; form-action 'self'; upgrade-insecure-requests",
            connect.join(" ")
        )
    }

    /// Headers stamped on every response.
    pub fn response_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=15552000; includeSubDomains; preload"),
            ),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-embedder-policy"),
                HeaderValue::from_static("require-corp"),
            ),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            ),
        ];

        match HeaderValue::from_str(&self.content_security_policy()) {
            Ok(csp) => headers.push((header::CONTENT_SECURITY_POLICY, csp)),
            Err(err) => warn!("[Security] Skipping Content-Security-Policy: {}", err),
        }
        headers
    }

    pub fn session_cookie(&self, session_id: &str) -> Result<HeaderValue, AppError> {
        let mut cookie = format!(
            "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; Max-Age={}",
            self.session_ttl.as_secs()
        );
        if self.production {
            cookie.push_str("; Secure; SameSite=Strict");
        } else {
            cookie.push_str("; SameSite=Lax");
        }
        HeaderValue::from_str(&cookie).map_err(|err| AppError::Internal(err.to_string()))
    }
}

struct Session {
    csrf_token: String,
    expires_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<String, Session>>,
}

fn random_token() -> String {
    let bytes: [u8; 32] = rng().random();
    hex::encode(bytes)
}

fn tokens_match(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_SESSIONS)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `(session_id, csrf_token)`. A live session keeps its token and
    /// has its expiry pushed back; anything else gets a fresh session.
    pub async fn issue(&self, existing: Option<&str>) -> (String, String) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| session.expires_at > now);

        if let Some(session_id) = existing {
            if let Some(session) = sessions.get_mut(session_id) {
                session.expires_at = now + self.ttl;
                return (session_id.to_string(), session.csrf_token.clone());
            }
        }

        while sessions.len() >= self.capacity {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, session)| session.expires_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!("[Session] Store full, evicted the oldest session");
        }

        let session_id = random_token();
        let csrf_token = random_token();
        sessions.insert(
            session_id.clone(),
            Session {
                csrf_token: csrf_token.clone(),
                expires_at: now + self.ttl,
            },
        );
        debug!("[Session] Issued new session ({} active)", sessions.len());
        (session_id, csrf_token)
    }

    pub async fn verify(&self, session_id: &str, token: &str) -> bool {
        let sessions = self.sessions.lock().await;
        match sessions.get(session_id) {
            Some(session) if session.expires_at > Instant::now() => {
                tokens_match(&session.csrf_token, token)
            }
            _ => false,
        }
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

fn csrf_token(headers: &HeaderMap) -> Option<&str> {
    CSRF_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

/// Rejects state-changing requests that do not carry the token bound to
/// their session cookie.
pub async fn csrf_protection(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.method();
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let token = csrf_token(headers).map(str::to_string);
    let valid = match (session_id(headers), token) {
        (Some(session_id), Some(token)) => state.sessions.verify(&session_id, &token).await,
        _ => false,
    };
    if !valid {
        warn!(
            "[Security] CSRF check failed for {} {}",
            request.method(),
            request.uri().path()
        );
        return Err(AppError::Csrf);
    }

    Ok(next.run(request).await)
}
