use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use thiserror::Error;

use crate::libcquizy::api::{ErrorBody, ErrorEnvelope, Status};
use crate::libcquizy::question::FieldError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid CSRF token")]
    Csrf,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Too many requests, please try again later")]
    RateLimited(u64),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn question_not_found() -> Self {
        AppError::NotFound("Question not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ERR_VALIDATION",
            AppError::NotFound(_) => "ERR_NOT_FOUND",
            AppError::Csrf => "ERR_CSRF_INVALID",
            AppError::Unauthorized(_) => "ERR_UNAUTHORIZED",
            AppError::RateLimited(_) => "ERR_RATE_LIMIT",
            AppError::Database(_) | AppError::Internal(_) => "ERR_INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(_) | AppError::Internal(_) => {
                error!("[API] {}", self);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let code = self.code().to_string();
        let retry_after = match &self {
            AppError::RateLimited(seconds) => Some(*seconds),
            _ => None,
        };
        let details = match self {
            AppError::Validation(details) => Some(details),
            _ => None,
        };

        let body = ErrorEnvelope {
            status: Status::Error,
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
