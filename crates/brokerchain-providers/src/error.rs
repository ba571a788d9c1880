use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// How a provider failure should be treated by callers and by the retry helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Rate limiting, 5xx, connection or timeout failures. Worth retrying.
    Transient,
    /// Rejected by the provider (4xx other than 429, auth, malformed response).
    Permanent,
    /// Credentials or URLs missing locally; no call was attempted.
    Configuration,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::Permanent => "permanent",
            Self::Configuration => "configuration",
        }
    }

    /// Only client errors other than 429 are permanent; anything else the
    /// provider answers with is worth another attempt.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Self::Permanent
        } else {
            Self::Transient
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider call that did not produce a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class} failure: {message}")]
pub struct ProviderError {
    pub class: FailureClass,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Permanent,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Configuration,
            message: message.into(),
        }
    }

    /// Non-success HTTP response from a provider.
    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        Self {
            class: FailureClass::from_status(status),
            message: format!("{provider} returned {}: {}", status.as_u16(), body.trim()),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class == FailureClass::Transient
    }

    pub fn is_configuration(&self) -> bool {
        self.class == FailureClass::Configuration
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let class = if let Some(status) = err.status() {
            FailureClass::from_status(status)
        } else if err.is_decode() || err.is_builder() {
            FailureClass::Permanent
        } else {
            // connect, timeout, reset mid-body
            FailureClass::Transient
        };
        Self {
            class,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::permanent(format!("unexpected response body: {err}"))
    }
}
