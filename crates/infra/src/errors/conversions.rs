//! Conversions from external infrastructure errors into domain errors.

use std::io::Error as IoError;

use dermalens_domain::DermalensError;
use keyring::Error as KeyringError;
use reqwest::Error as HttpError;
use serde_json::Error as JsonError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub DermalensError);

impl From<InfraError> for DermalensError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<DermalensError> for InfraError {
    fn from(value: DermalensError) -> Self {
        InfraError(value)
    }
}

trait IntoDermalensError {
    fn into_dermalens(self) -> DermalensError;
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → DermalensError */
/* -------------------------------------------------------------------------- */

impl IntoDermalensError for KeyringError {
    fn into_dermalens(self) -> DermalensError {
        use KeyringError::{
            Ambiguous, BadEncoding, Invalid, NoEntry, NoStorageAccess, PlatformFailure, TooLong,
        };

        let description = self.to_string();

        match self {
            NoEntry => DermalensError::Storage("keychain entry not found".into()),
            BadEncoding(_) => {
                DermalensError::Storage("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => DermalensError::Storage(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                DermalensError::Storage(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            Ambiguous(entries) => DermalensError::Storage(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => {
                DermalensError::Storage(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                DermalensError::Storage(format!("unable to access secure storage: {err}"))
            }
            _ => DermalensError::Storage(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_dermalens())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DermalensError */
/* -------------------------------------------------------------------------- */

impl IntoDermalensError for HttpError {
    fn into_dermalens(self) -> DermalensError {
        if self.is_timeout() {
            return DermalensError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return DermalensError::Network("HTTP connection failure".into());
        }

        if self.is_builder() {
            return DermalensError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => DermalensError::Auth(message),
                _ => DermalensError::Network(message),
            };
        }

        DermalensError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_dermalens())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error / serde_json::Error → DermalensError */
/* -------------------------------------------------------------------------- */

impl From<IoError> for InfraError {
    fn from(value: IoError) -> Self {
        InfraError(DermalensError::Storage(format!("I/O failure: {value}")))
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(DermalensError::Serialization(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
