use reqwest::StatusCode;
use thiserror::Error;

/// Failure classes surfaced by the scoring and analytics service transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    #[error("bad request (HTTP {status})")]
    BadRequest { status: u16 },

    #[error("not found (HTTP 404)")]
    NotFound,

    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },

    #[error("service unavailable (HTTP {status})")]
    ServiceUnavailable { status: u16 },

    #[error("unknown response code {status}")]
    UnknownCode { status: u16 },
}

impl TransportError {
    /// Classifies a non-success HTTP status. Returns `None` for 2xx.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        let code = status.as_u16();
        match code {
            200..=299 => None,
            404 => Some(TransportError::NotFound),
            400..=499 => Some(TransportError::BadRequest { status: code }),
            500 => Some(TransportError::ServerError { status: code }),
            501..=599 => Some(TransportError::ServiceUnavailable { status: code }),
            _ => Some(TransportError::UnknownCode { status: code }),
        }
    }

    /// Short reason attached to an invalid prediction.
    ///
    /// Client-side failures (any 4xx) read as "bad request", every 5xx as
    /// "service unavailable".
    pub fn prediction_reason(&self) -> String {
        match self {
            TransportError::Transport { .. } => "transport failure".to_string(),
            TransportError::BadRequest { .. } | TransportError::NotFound => {
                "bad request".to_string()
            }
            TransportError::ServerError { .. } | TransportError::ServiceUnavailable { .. } => {
                "service unavailable".to_string()
            }
            TransportError::UnknownCode { status } => format!("unknown code {}", status),
        }
    }
}

/// Errors raised while validating loaded configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Confidence bounds invalid: min {min:.2} must be <= max {max:.2} and both within [0, 1]")]
    ConfidenceBounds { min: f64, max: f64 },

    #[error("Point size must be positive, got {point}")]
    PointSize { point: f64 },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("Invalid service URL {url}: {reason}")]
    ServiceUrl { url: String, reason: String },
}
