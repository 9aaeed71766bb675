use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for sharelimit
#[derive(Debug)]
pub enum ShareLimitError {
    /// Configuration errors detected at construction time
    Config(String),

    /// The shared liveness store could not be reached or refused a call
    StoreUnavailable(String),

    /// Admission refused because the admitted rate is zero (fail-fast callers)
    Unavailable,

    /// The caller's wait context was cancelled
    Cancelled,

    /// The caller's wait context deadline elapsed
    DeadlineExceeded,

    /// Malformed requests to the registry service
    Api(String),

    /// System I/O errors
    Io(std::io::Error),

    /// JSON serialization/deserialization errors
    Serialization(serde_json::Error),
}

impl fmt::Display for ShareLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareLimitError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ShareLimitError::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            ShareLimitError::Unavailable => write!(f, "No requests are admitted right now"),
            ShareLimitError::Cancelled => write!(f, "Wait cancelled"),
            ShareLimitError::DeadlineExceeded => write!(f, "Wait deadline exceeded"),
            ShareLimitError::Api(msg) => write!(f, "API error: {}", msg),
            ShareLimitError::Io(err) => write!(f, "I/O error: {}", err),
            ShareLimitError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ShareLimitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShareLimitError::Io(err) => Some(err),
            ShareLimitError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, ShareLimitError>;

impl IntoResponse for ShareLimitError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl ShareLimitError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShareLimitError::Config(_) => StatusCode::BAD_REQUEST,
            ShareLimitError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShareLimitError::Unavailable => StatusCode::TOO_MANY_REQUESTS,
            ShareLimitError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            ShareLimitError::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
            ShareLimitError::Api(_) => StatusCode::BAD_REQUEST,
            ShareLimitError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ShareLimitError::Serialization(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            ShareLimitError::Config(_) => "configuration_error",
            ShareLimitError::StoreUnavailable(_) => "store_unavailable",
            ShareLimitError::Unavailable => "unavailable",
            ShareLimitError::Cancelled => "cancelled",
            ShareLimitError::DeadlineExceeded => "deadline_exceeded",
            ShareLimitError::Api(_) => "api_error",
            ShareLimitError::Io(_) => "io_error",
            ShareLimitError::Serialization(_) => "serialization_error",
        }
    }

    /// True when the error came from the caller's own wait context
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ShareLimitError::Cancelled | ShareLimitError::DeadlineExceeded
        )
    }
}

impl From<std::io::Error> for ShareLimitError {
    fn from(err: std::io::Error) -> Self {
        ShareLimitError::Io(err)
    }
}

impl From<serde_json::Error> for ShareLimitError {
    fn from(err: serde_json::Error) -> Self {
        ShareLimitError::Serialization(err)
    }
}

impl From<reqwest::Error> for ShareLimitError {
    fn from(err: reqwest::Error) -> Self {
        ShareLimitError::StoreUnavailable(err.to_string())
    }
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::ShareLimitError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ShareLimitError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! store_error {
    ($msg:expr) => {
        $crate::error::ShareLimitError::StoreUnavailable($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ShareLimitError::StoreUnavailable(format!($fmt, $($arg)*))
    };
}
