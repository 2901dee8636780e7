//! Auth bootstrap endpoints
//!
//! Login, registration and the refresh exchange. None of these carry a
//! bearer credential.

use std::sync::Arc;

use async_trait::async_trait;
use dermalens_core::{SessionController, TokenRefresher};
use dermalens_domain::constants::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH};
use dermalens_domain::{
    ApiConfig, Credential, LoginRequest, LoginResponse, RefreshError, RefreshRequest,
    RefreshResponse, RefreshedTokens,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::client::ApiClient;
use super::errors::ApiError;
use super::request::ApiRequest;
use crate::http::HttpClient;

/// [`TokenRefresher`] over `POST {base}/auth/refresh`.
///
/// One call is exactly one network request: the transport is built with a
/// single attempt.
pub struct HttpTokenRefresher {
    http: HttpClient,
    url: String,
}

impl HttpTokenRefresher {
    /// # Errors
    /// Returns [`ApiError::Config`] if the HTTP client cannot be built
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = HttpClient::builder()
            .timeout(config.refresh_timeout())
            .max_attempts(1)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build refresh client: {e}")))?;
        Ok(Self { http, url: config.url(REFRESH_PATH) })
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let body = RefreshRequest { refresh_token: refresh_token.to_string() };
        let builder = self.http.request(reqwest::Method::POST, &self.url).json(&body);

        let response = self
            .http
            .send(builder)
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Refresh endpoint returned non-success");
            return Err(RefreshError::from_status(status.as_u16(), message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RefreshError::Network(format!("Failed to read refresh body: {e}")))?;
        let parsed: RefreshResponse = serde_json::from_slice(&bytes)
            .map_err(|e| RefreshError::Malformed(e.to_string()))?;

        parsed.into_tokens()
    }
}

/// Login, registration and logout on top of an [`ApiClient`]
pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    fn session(&self) -> &Arc<SessionController> {
        self.client.session()
    }

    /// Sign in and persist the returned credential.
    ///
    /// The credential is fully stored and the token gate open before this
    /// returns.
    ///
    /// # Errors
    /// Request errors from the pipeline; [`ApiError::Storage`] if the
    /// credential could not be persisted.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let request = ApiRequest::post_json(LOGIN_PATH, &body)?.as_bootstrap();
        let response: LoginResponse = self.client.execute(request).await?.json()?;

        let credential = Credential::new(
            response.access_token.clone(),
            response.refresh_token.clone(),
            response.user.clone(),
        );
        self.session()
            .establish_session(&credential)
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        info!("Login succeeded");
        Ok(response)
    }

    /// Create an account. Does not touch the session.
    ///
    /// # Errors
    /// Request errors from the pipeline
    pub async fn register<B, T>(&self, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = ApiRequest::post_json(REGISTER_PATH, body)?.as_bootstrap();
        self.client.execute(request).await?.json()
    }

    /// User-initiated logout
    pub async fn logout(&self) {
        self.session().logout().await;
    }
}
