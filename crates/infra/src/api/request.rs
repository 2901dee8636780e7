//! Request model for the API pipeline
//!
//! An [`ApiRequest`] keeps its body as owned data so the pipeline can rebuild
//! the HTTP request when it resubmits after a token refresh. Multipart parts
//! are stored as bytes for the same reason.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Serialize;

use super::errors::ApiError;

/// Whether an endpoint participates in the token lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Login, registration and refresh: never carry a credential
    AuthBootstrap,
    /// Everything else
    Protected,
}

/// Classifies request paths against the configured bootstrap paths
#[derive(Debug, Clone)]
pub struct EndpointPolicy {
    bootstrap_paths: Vec<String>,
}

impl EndpointPolicy {
    pub fn new(bootstrap_paths: Vec<String>) -> Self {
        Self { bootstrap_paths }
    }

    /// Query strings are ignored and a missing leading `/` is implied; a path
    /// matches a bootstrap path when it is equal to it or ends with it (API
    /// prefixes such as `/v1`).
    pub fn classify(&self, path: &str) -> EndpointKind {
        let path = normalize(path);
        let bootstrap = self
            .bootstrap_paths
            .iter()
            .map(|p| normalize(p))
            .any(|p| p != "/" && (path == p || path.ends_with(&p)));

        if bootstrap {
            EndpointKind::AuthBootstrap
        } else {
            EndpointKind::Protected
        }
    }
}

fn normalize(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path).trim_matches('/');
    format!("/{path}")
}

/// One field of a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    name: String,
    bytes: Vec<u8>,
    file_name: Option<String>,
    mime: Option<String>,
}

impl MultipartPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), bytes: value.into().into_bytes(), file_name: None, mime: None }
    }

    /// A file field, e.g. a captured face photo
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            bytes,
            file_name: Some(file_name.into()),
            mime: Some(mime.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn to_part(&self) -> Result<Part, ApiError> {
        let mut part = Part::bytes(self.bytes.clone());
        if let Some(file_name) = &self.file_name {
            part = part.file_name(file_name.clone());
        }
        if let Some(mime) = &self.mime {
            part = part
                .mime_str(mime)
                .map_err(|e| ApiError::Config(format!("Invalid MIME type '{mime}': {e}")))?;
        }
        Ok(part)
    }
}

/// Request body kept in a rebuildable form
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<MultipartPart>),
}

impl RequestBody {
    /// Fresh multipart form; the transport generates the boundary and the
    /// content type.
    pub(crate) fn form(parts: &[MultipartPart]) -> Result<Form, ApiError> {
        parts.iter().try_fold(Form::new(), |form, part| {
            Ok(form.part(part.name.clone(), part.to_part()?))
        })
    }
}

/// A request travelling through [`super::ApiClient`]
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: RequestBody,
    timeout: Option<Duration>,
    bootstrap: bool,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            timeout: None,
            bootstrap: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// # Errors
    /// Returns [`ApiError::Config`] if `body` cannot be serialized.
    pub fn post_json<B: Serialize + ?Sized>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApiError> {
        Self::new(Method::POST, path).with_json(body)
    }

    /// # Errors
    /// Returns [`ApiError::Config`] if `body` cannot be serialized.
    pub fn put_json<B: Serialize + ?Sized>(
        path: impl Into<String>,
        body: &B,
    ) -> Result<Self, ApiError> {
        Self::new(Method::PUT, path).with_json(body)
    }

    /// Multipart `POST`
    pub fn upload(path: impl Into<String>, parts: Vec<MultipartPart>) -> Self {
        Self { body: RequestBody::Multipart(parts), ..Self::new(Method::POST, path) }
    }

    /// # Errors
    /// Returns [`ApiError::Config`] if `body` cannot be serialized.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Config(format!("Failed to serialize body: {e}")))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Override the pipeline's transport timeout for this request
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Treat this request as an auth bootstrap call whatever its path: no
    /// gate, no credential, no 401 recovery.
    #[must_use]
    pub fn as_bootstrap(mut self) -> Self {
        self.bootstrap = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Whether this request already went through 401 recovery
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}
