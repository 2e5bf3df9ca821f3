//! Error handling for the Baloot server.
//!
//! Rejections surfaced to clients carry an `ErrorKind`; they are acked on the
//! originating event and never mutate state. Infrastructure failures are
//! logged and degrade (local rate-limit fallback, best-effort snapshots,
//! auto-play for bot timeouts) rather than propagate to clients.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::errors::{DomainError, ErrorKind};

#[derive(Error, Debug)]
pub enum AppError {
    /// Client-fault or resource-limit rejection; acked with its wire kind.
    #[error("rejected {}: {detail}", kind.as_str())]
    Rejected { kind: ErrorKind, detail: String },
    /// Key-value store failure; callers degrade to local fallbacks.
    #[error("kv error: {detail}")]
    Kv { detail: String },
    /// Startup/environment misconfiguration.
    #[error("configuration error: {detail}")]
    Config { detail: String },
    /// Unexpected server-side failure; logged and isolated.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl AppError {
    pub fn rejected(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kv(detail: impl Into<String>) -> Self {
        Self::Kv {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// The wire kind this error surfaces as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rejected { kind, .. } => *kind,
            Self::Kv { .. } | Self::Config { .. } | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Human-readable detail for acks and logs.
    pub fn detail(&self) -> &str {
        match self {
            Self::Rejected { detail, .. }
            | Self::Kv { detail }
            | Self::Config { detail }
            | Self::Internal { detail } => detail,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        Self::Rejected {
            kind: err.kind(),
            detail: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

// The HTTP surface is small (health + WS upgrade); everything else travels
// over the event stream. Still, handler errors must render sensibly.
impl actix_web::error::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected { kind, .. } if kind.retryable() => StatusCode::TOO_MANY_REQUESTS,
            Self::Rejected { .. } => StatusCode::BAD_REQUEST,
            Self::Kv { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            kind: self.kind().as_str(),
            message: self.detail().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MoveViolation;

    #[test]
    fn domain_error_converts_with_kind() {
        let err: AppError = DomainError::IllegalMove(MoveViolation::MustTrump).into();
        assert_eq!(err.kind(), ErrorKind::IllegalMove);
    }

    #[test]
    fn infra_errors_surface_internal() {
        assert_eq!(AppError::kv("down").kind(), ErrorKind::Internal);
        assert_eq!(AppError::internal("boom").kind(), ErrorKind::Internal);
    }
}
