//! Error types for remote platform operations.
//!
//! Every remote failure carries the HTTP-like status and the message the
//! platform returned. Categories let callers decide whether a failure means
//! "already absent" (safe to ignore for deletes and lookups) or is fatal for
//! the current environment.

use thiserror::Error;

/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of platform errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The resource does not exist (404)
    NotFound,
    /// Token missing, invalid or lacking access (401/403)
    Auth,
    /// Request conflicts with current remote state (409/422)
    Conflict,
    /// Too many requests (429)
    RateLimited,
    /// Connection, TLS or timeout failure
    Network,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether the resource is simply absent.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::NotFound => "Check the app name, or run `hoist setup app` to create it",
            Self::Auth => "Set HEROKU_API_KEY or log in so ~/.netrc holds a token",
            Self::Conflict => "Inspect the remote app; it may be in a conflicting state",
            Self::RateLimited => "Wait a moment before running the command again",
            Self::Network => "Check your internet connection and try again",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to the remote platform.
#[derive(Debug, Error)]
pub enum Error {
    /// A named resource was not found
    #[error("{resource} not found: {name}")]
    NotFound {
        /// Kind of resource (app, addon, domain, ...)
        resource: &'static str,
        /// Identifier that was looked up
        name: String,
    },

    /// The platform answered with a non-success status
    #[error("status {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Machine-readable error id, when provided
        id: Option<String>,
        /// Human-readable message from the platform
        message: String,
    },

    /// No API token could be found
    #[error("no API token found (set HEROKU_API_KEY or add api.heroku.com to ~/.netrc)")]
    MissingToken,

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Api { status, .. } => match status {
                404 => ErrorCategory::NotFound,
                401 | 403 => ErrorCategory::Auth,
                409 | 422 => ErrorCategory::Conflict,
                429 => ErrorCategory::RateLimited,
                _ => ErrorCategory::Other,
            },
            Error::MissingToken => ErrorCategory::Auth,
            Error::Network(_) => ErrorCategory::Network,
            Error::Decode(_) | Error::Io(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error means the resource is already absent.
    pub fn is_not_found(&self) -> bool {
        self.category().is_absent()
    }

    /// HTTP-like status, when the error came from the platform.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::NotFound { .. } => Some(404),
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an error from a failed response body (`{"id": ..., "message": ...}`).
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            id: Option<String>,
            message: Option<String>,
        }

        let parsed: Option<ApiError> = serde_json::from_str(body).ok();
        let (id, message) = match parsed {
            Some(e) => (e.id, e.message),
            None => (None, None),
        };

        Error::Api {
            status,
            id,
            message: message.unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.to_string()
                }
            }),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Error::Api {
                status,
                id: None,
                message: format!("HTTP {status}"),
            },
            ureq::Error::Json(e) => Error::Decode(e.to_string()),
            other => Error::Network(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

/// Normalize "already absent" to success for idempotent operations.
///
/// Returns `Ok(true)` when the operation took effect, `Ok(false)` when the
/// resource was already gone.
pub fn ignore_not_found(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_parses_message() {
        let err = Error::from_response(
            422,
            r#"{"id":"invalid_params","message":"Name is already taken."}"#,
        );
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.to_string(), "status 422: Name is already taken.");
    }

    #[test]
    fn test_from_response_falls_back_to_body() {
        let err = Error::from_response(500, "upstream exploded");
        assert_eq!(err.to_string(), "status 500: upstream exploded");
        assert_eq!(Error::from_response(502, "").to_string(), "status 502: HTTP 502");
    }

    #[test]
    fn test_ignore_not_found() {
        assert!(ignore_not_found(Ok(())).unwrap());
        assert!(!ignore_not_found(Err(Error::from_response(404, "{}"))).unwrap());
        assert!(
            !ignore_not_found(Err(Error::NotFound {
                resource: "domain",
                name: "www.example.com".into(),
            }))
            .unwrap()
        );
        assert!(ignore_not_found(Err(Error::from_response(403, "{}"))).is_err());
    }
}
