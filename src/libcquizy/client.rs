//! HTTP client for the question API.
use log::{debug, error};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use thiserror::Error;

use crate::libcquizy::api::{
    CsrfTokenBody, Envelope, ErrorEnvelope, Health, QuestionBody, QuestionList, CSRF_HEADER,
};
use crate::libcquizy::question::{FieldError, NewQuestion, Question, QuestionPatch};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/v1";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error: {status} - {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
        details: Vec<FieldError>,
    },
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code.as_str()),
            ClientError::Http(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Which listing endpoint to read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListSource {
    #[default]
    Protected,
    Public,
}

impl ListSource {
    fn path(&self) -> &'static str {
        match self {
            ListSource::Protected => "/questions",
            ListSource::Public => "/questions/public",
        }
    }
}

#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    csrf_token: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            csrf_token: Mutex::new(None),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn check(&self, endpoint: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let err = match response.json::<ErrorEnvelope>().await {
            Ok(envelope) => ClientError::Api {
                status: status.as_u16(),
                code: envelope.error.code,
                message: envelope.error.message,
                details: envelope.error.details.unwrap_or_default(),
            },
            Err(_) => ClientError::Api {
                status: status.as_u16(),
                code: String::new(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                details: Vec::new(),
            },
        };
        if status == StatusCode::FORBIDDEN {
            self.forget_csrf_token();
        }
        error!("[Client] API Error ({}): {}", endpoint, err);
        Err(err)
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T> {
        debug!("[Client] {}", endpoint);
        let response = request.send().await.map_err(|err| {
            error!("[Client] API Error ({}): {}", endpoint, err);
            err
        })?;
        Ok(self.check(endpoint, response).await?.json().await?)
    }

    async fn protected(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.csrf_token().await?;
        Ok(request.header(CSRF_HEADER, token))
    }

    /// Returns the cached CSRF token, fetching one (and with it a session
    /// cookie) on first use.
    pub async fn csrf_token(&self) -> Result<String> {
        if let Some(token) = self.cached_csrf_token() {
            return Ok(token);
        }
        let endpoint = "/csrf-token";
        let body: CsrfTokenBody = self.fetch(endpoint, self.http.get(self.url(endpoint))).await?;
        if let Ok(mut cached) = self.csrf_token.lock() {
            *cached = Some(body.csrf_token.clone());
        }
        Ok(body.csrf_token)
    }

    fn cached_csrf_token(&self) -> Option<String> {
        self.csrf_token.lock().ok().and_then(|token| token.clone())
    }

    fn forget_csrf_token(&self) {
        if let Ok(mut cached) = self.csrf_token.lock() {
            *cached = None;
        }
    }

    pub async fn health(&self) -> Result<Health> {
        let endpoint = "/health";
        self.fetch(endpoint, self.http.get(self.url(endpoint))).await
    }

    pub async fn list_questions(&self, source: ListSource, category: Option<&str>) -> Result<Vec<Question>> {
        let endpoint = source.path();
        let mut request = self.http.get(self.url(endpoint));
        if let Some(category) = category {
            request = request.query(&[("category", category)]);
        }
        let envelope: Envelope<QuestionList> = self.fetch(endpoint, request).await?;
        Ok(envelope.data.questions)
    }

    pub async fn get_question(&self, id: i64) -> Result<Question> {
        let endpoint = format!("/questions/{id}");
        let envelope: Envelope<QuestionBody> =
            self.fetch(&endpoint, self.http.get(self.url(&endpoint))).await?;
        Ok(envelope.data.question)
    }

    pub async fn create_question(&self, question: &NewQuestion) -> Result<Question> {
        let endpoint = "/questions";
        let request = self.protected(self.http.post(self.url(endpoint)).json(question)).await?;
        let envelope: Envelope<QuestionBody> = self.fetch(endpoint, request).await?;
        Ok(envelope.data.question)
    }

    pub async fn update_question(&self, id: i64, patch: &QuestionPatch) -> Result<Question> {
        let endpoint = format!("/questions/{id}");
        let request = self.protected(self.http.put(self.url(&endpoint)).json(patch)).await?;
        let envelope: Envelope<QuestionBody> = self.fetch(&endpoint, request).await?;
        Ok(envelope.data.question)
    }

    pub async fn delete_question(&self, id: i64) -> Result<()> {
        let endpoint = format!("/questions/{id}");
        let request = self.protected(self.http.delete(self.url(&endpoint))).await?;
        let response = request.send().await?;
        self.check(&endpoint, response).await?;
        Ok(())
    }
}
