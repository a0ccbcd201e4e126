pub mod config;
pub mod models;
pub mod retry;
pub mod service;
pub mod status;
pub mod util;

use http::StatusCode;

/// A non-success response from an external API.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed for '{target}': {status}")]
pub struct UpstreamError {
    pub operation: String,
    pub target: String,
    pub status: StatusCode,
}

impl UpstreamError {
    pub fn new(operation: impl Into<String>, target: impl Into<String>, status: StatusCode) -> Self {
        Self { operation: operation.into(), target: target.into(), status }
    }

    /// Check a response status, producing an error for anything outside 2xx.
    pub fn check(
        status: StatusCode,
        operation: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<(), Self> {
        if status.is_success() { Ok(()) } else { Err(Self::new(operation, target, status)) }
    }

    pub fn is_transient(&self) -> bool { is_transient_status(self.status) }
}

/// Statuses worth retrying at the transport level.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT
    )
}
