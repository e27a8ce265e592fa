use std::io;

use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::ContentRange;
use axum_extra::TypedHeader;
use thiserror::Error;

use crate::path::ResolveError;
use crate::range::RangeError;

/// Everything that can end a request early, mapped to a status at the
/// handler boundary.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("path out of bounds")]
    OutOfBounds,
    #[error("file or directory not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    /// Both malformed and out-of-bounds `Range` headers end up here.
    #[error("range not satisfiable for size {size}")]
    RangeNotSatisfiable { size: u64 },
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl ServeError {
    pub fn range(err: RangeError, size: u64) -> Self {
        tracing::debug!(%err, size, "rejecting Range header");
        ServeError::RangeNotSatisfiable { size }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::OutOfBounds | ServeError::PermissionDenied => StatusCode::FORBIDDEN,
            ServeError::NotFound => StatusCode::NOT_FOUND,
            ServeError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ServeError::InvalidHeader(_) | ServeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ResolveError> for ServeError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::OutOfBounds => ServeError::OutOfBounds,
            ResolveError::NotFound => ServeError::NotFound,
        }
    }
}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ServeError::NotFound,
            io::ErrorKind::PermissionDenied => ServeError::PermissionDenied,
            _ => ServeError::Io(err),
        }
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ServeError::OutOfBounds => (status, "Forbidden: Path out of bounds").into_response(),
            ServeError::NotFound => (status, "File or Directory Not Found").into_response(),
            ServeError::PermissionDenied => (status, "Forbidden: Permission denied").into_response(),
            ServeError::RangeNotSatisfiable { size } => {
                let header = TypedHeader(ContentRange::unsatisfied_bytes(size));
                (status, header, "Range Not Satisfiable").into_response()
            }
            ServeError::InvalidHeader(_) | ServeError::Io(_) => {
                tracing::warn!(error = %self, "request failed");
                (status, "Internal Server Error").into_response()
            }
        }
    }
}

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} {value:?}: {source}")]
    InvalidAddr {
        key: &'static str,
        value: String,
        source: std::net::AddrParseError,
    },
}
