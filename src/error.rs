// src/error.rs

//! Unified error handling for the migration tools.

use std::fmt;

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Date parsing failed
    #[error("Date parse error: {0}")]
    Date(#[from] chrono::ParseError),

    /// Base64 payload could not be decoded
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Login or token rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Remote API answered with a non-success status
    #[error("API error for {context} (HTTP {status}): {message}")]
    Api {
        context: String,
        status: u16,
        message: String,
    },

    /// WebDriver session or command failed
    #[error("Browser error: {0}")]
    Browser(String),

    /// Attachment download or conversion failed
    #[error("Media error: {0}")]
    Media(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create an API error with context and status.
    pub fn api(context: impl Into<String>, status: u16, message: impl fmt::Display) -> Self {
        Self::Api {
            context: context.into(),
            status,
            message: message.to_string(),
        }
    }

    /// Create a browser error.
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// Create a media error.
    pub fn media(message: impl fmt::Display) -> Self {
        Self::Media(message.to_string())
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(feature = "browser")]
impl From<fantoccini::error::CmdError> for AppError {
    fn from(e: fantoccini::error::CmdError) -> Self {
        Self::Browser(e.to_string())
    }
}

#[cfg(feature = "browser")]
impl From<fantoccini::error::NewSessionError> for AppError {
    fn from(e: fantoccini::error::NewSessionError) -> Self {
        Self::Browser(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_reports_status() {
        let err = AppError::api("create memo", 500, "boom");
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err.to_string(),
            "API error for create memo (HTTP 500): boom"
        );
    }

    #[test]
    fn config_error_has_no_status() {
        assert_eq!(AppError::config("missing token").status(), None);
    }
}
