//! API client: the request/response pipeline
//!
//! Outgoing, protected endpoints wait for the token gate (running the
//! cold-start pre-refresh when needed) and carry `Authorization: Bearer`.
//! Incoming, a 401 on a request that has not been retried is recovered
//! through the session's single-flight refresh and resubmitted once.

use std::sync::Arc;
use std::time::Duration;

use dermalens_core::{RefreshFailure, SessionController};
use dermalens_domain::ApiConfig;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::errors::ApiError;
use super::request::{ApiRequest, EndpointKind, EndpointPolicy, MultipartPart, RequestBody};
use crate::http::HttpClient;

/// Fully buffered response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    async fn read(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {e}")))?
            .to_vec();
        Ok(Self { status, headers, body })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body; 204/205 deserialize from `null`.
    ///
    /// # Errors
    /// Returns [`ApiError::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.status == StatusCode::NO_CONTENT || self.status == StatusCode::RESET_CONTENT {
            // No body for these statuses
            return serde_json::from_value(serde_json::Value::Null).map_err(|_| {
                ApiError::Decode(format!(
                    "No content response ({}), but response type cannot be deserialized from empty body",
                    self.status.as_u16()
                ))
            });
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::Decode(format!("Failed to parse response: {e}")))
    }
}

/// API client bound to one [`SessionController`]
pub struct ApiClient {
    http: HttpClient,
    session: Arc<SessionController>,
    config: ApiConfig,
    endpoints: EndpointPolicy,
}

impl ApiClient {
    /// Create a new API client
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built
    pub fn new(config: ApiConfig, session: Arc<SessionController>) -> Result<Self, ApiError> {
        Self::builder().config(config).session(session).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Run a request through the pipeline.
    ///
    /// # Errors
    /// Non-success statuses map onto [`ApiError`]; a 401 that could not be
    /// recovered surfaces as [`ApiError::Unauthorized`] (no refresh token) or
    /// [`ApiError::RefreshFailed`].
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let kind = if request.is_bootstrap() {
            EndpointKind::AuthBootstrap
        } else {
            self.endpoints.classify(request.path())
        };
        let token = match kind {
            EndpointKind::AuthBootstrap => None,
            EndpointKind::Protected => self.session.authorize().await,
        };

        let response = self.send(&request, token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED
            || kind == EndpointKind::AuthBootstrap
            || request.is_retried()
        {
            return self.check(response, &request);
        }

        request.mark_retried();
        debug!("Received 401; recovering session");

        match self.session.recover_from_unauthorized(token.as_deref()).await {
            Ok(fresh) => {
                let retry = self.send(&request, Some(&fresh)).await?;
                self.check(retry, &request)
            }
            Err(RefreshFailure::NoRefreshToken) => self.check(response, &request),
            Err(failure) => {
                warn!(error = %failure, "Session recovery failed");
                Err(ApiError::RefreshFailed(failure))
            }
        }
    }

    /// Execute a GET request
    ///
    /// # Errors
    /// Returns error if request fails or response cannot be deserialized
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// Execute a POST request with a JSON body
    ///
    /// # Errors
    /// Returns error if request fails or response cannot be deserialized
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(ApiRequest::post_json(path, body)?).await?.json()
    }

    /// Execute a multipart upload
    ///
    /// # Errors
    /// Returns error if request fails or response cannot be deserialized
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        parts: Vec<MultipartPart>,
    ) -> Result<T, ApiError> {
        self.execute(ApiRequest::upload(path, parts)).await?.json()
    }

    /// Execute a DELETE request
    ///
    /// # Errors
    /// Returns error if request fails or response cannot be deserialized
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(ApiRequest::delete(path)).await?.json()
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        let url = self.config.url(request.path());
        let mut builder = self.http.request(request.method().clone(), &url);

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(RequestBody::form(parts)?),
        };

        let timeout = request.timeout().unwrap_or_else(|| self.config.request_timeout());
        debug!(url = %url, authorized = token.is_some(), "Sending API request");

        let response = match tokio::time::timeout(timeout, self.http.send(builder)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(ApiError::from(err)),
            Err(_) => return Err(ApiError::Timeout(timeout)),
        };

        match tokio::time::timeout(timeout, ApiResponse::read(response)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(timeout)),
        }
    }

    fn check(&self, response: ApiResponse, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let status = response.status();
        if status.is_success() {
            info!(path = %request.path(), status = status.as_u16(), "API request successful");
            return Ok(response);
        }
        Err(Self::map_status_error(status, request.path(), &response.text()))
    }

    fn map_status_error(status: StatusCode, path: &str, body: &str) -> ApiError {
        let message = if body.is_empty() {
            format!("{path} returned status {status}")
        } else {
            format!("{path} returned status {status}: {body}")
        };

        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized(message)
        } else if status == StatusCode::FORBIDDEN {
            ApiError::Forbidden(message)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            ApiError::RateLimit(message)
        } else if status.is_server_error() {
            ApiError::Server(message)
        } else if status.is_client_error() {
            ApiError::Client(message)
        } else {
            ApiError::Network(message)
        }
    }
}

/// Builder for API client
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ApiConfig>,
    session: Option<Arc<SessionController>>,
    max_attempts: Option<usize>,
    base_backoff: Option<Duration>,
}

impl ApiClientBuilder {
    /// Set the API configuration
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session controller shared with every other trigger
    pub fn session(mut self, session: Arc<SessionController>) -> Self {
        self.session = Some(session);
        self
    }

    /// Transport attempts for retryable failures of cloneable requests
    /// (default 1)
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = Some(backoff);
        self
    }

    /// Build the API client
    ///
    /// # Errors
    /// Returns error if required fields are missing or client creation fails
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let config = self.config.unwrap_or_default();
        let session =
            self.session.ok_or_else(|| ApiError::Config("Session controller not set".to_string()))?;

        let mut http = HttpClient::builder()
            .no_timeout()
            .max_attempts(self.max_attempts.unwrap_or(1))
            .user_agent(config.user_agent.clone());
        if let Some(backoff) = self.base_backoff {
            http = http.base_backoff(backoff);
        }
        let http = http
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HttpClient: {e}")))?;

        let endpoints = EndpointPolicy::new(config.bootstrap_paths.clone());
        Ok(ApiClient { http, session, config, endpoints })
    }
}
