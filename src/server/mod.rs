//! The question API: an axum router over the SQLite store.
//!
//! Reads (`GET /questions`, `GET /questions/{id}`) only need an allowed
//! origin. Writes additionally need the session cookie handed out by
//! `GET /csrf-token` and the matching token in the `X-CSRF-Token` header.
//! `GET /questions/public` and `GET /health` sit outside the CSRF layer.
//! Everything under `/api` counts against the per-address rate limit.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use log::{info, warn};
use thiserror::Error;
use tokio::{net::TcpListener, signal};
use tower_http::{compression::CompressionLayer, set_header::SetResponseHeaderLayer};

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod security;
pub mod state;

use crate::libcquizy::api::API_PREFIX;
use crate::libcquizy::db;
use config::ServerConfig;
use routes::{
    create_question, csrf_token, delete_question, favicon, get_question, health, list_questions,
    not_found, update_question, welcome,
};
use rate_limit::rate_limit;
use security::csrf_protection;
use state::AppState;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/{id}",
            get(get_question).put(update_question).delete(delete_question),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), csrf_protection));

    let api = Router::new()
        .route("/health", get(health))
        .route("/csrf-token", get(csrf_token))
        .route("/questions/public", get(list_questions))
        .merge(protected)
        .method_not_allowed_fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    let mut router = Router::new()
        .route("/", get(welcome))
        .route("/favicon.ico", get(favicon))
        .nest(API_PREFIX, api)
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(middleware::from_fn(log_requests))
        .layer(CompressionLayer::new());

    for (name, value) in state.policy.response_headers() {
        router = router.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    router
        .layer(state.policy.cors_layer())
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = started.elapsed().as_millis();
    if status.is_server_error() || status.is_client_error() {
        warn!("[API] {} {} {} {}ms", method, path, status.as_u16(), elapsed);
    } else {
        info!("[API] {} {} {} {}ms", method, path, status.as_u16(), elapsed);
    }
    response
}

pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("[Setup] Opening question store at {}", config.db.display());
    let connection = db::create_or_open(&config.db)?;
    let state = AppState::new(connection, config.policy());

    if config.production {
        info!("[Setup] Production mode: secure cookies enabled");
    }
    info!(
        "[Setup] Allowed origins: {}",
        state.policy.allowed_origins.join(", ")
    );

    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!("[Setup] Server running on {}", address);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("[Setup] Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("[Setup] Received Ctrl+C, shutting down"),
            Err(err) => {
                warn!("[Setup] Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("[Setup] Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!("[Setup] Failed to install signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
