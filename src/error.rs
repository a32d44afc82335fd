use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::webhooks::gateway::GatewayError;
use crate::webhooks::verification::VerificationFailure;

/// Response body for a request whose event was applied (or deliberately ignored).
pub const PROCESSED_BODY: &str = "processed successfully";

/// Header carrying the server-side error id on failed requests.
pub const ERROR_ID_HEADER: &str = "x-error-id";

/// The error type for webhook processing.
///
/// Client faults (`MissingHeaders`, `InvalidSignature`) are rejected with a
/// 400 before any payload field is trusted. Everything else is a server fault
/// and maps to 500 so the provider's redelivery re-drives the envelope.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Webhook secret not configured: {0}")]
    Misconfigured(String),

    #[error("Missing signature headers")]
    MissingHeaders,

    #[error("Webhook verification failed: {0}")]
    InvalidSignature(VerificationFailure),

    #[error("Malformed event payload: {0}")]
    Parse(String),

    #[error("Error processing event {event_type}: {source}")]
    Dispatch {
        event_type: String,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn misconfigured(msg: impl Into<String>) -> Self {
        Self::Misconfigured(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn dispatch(event_type: impl Into<String>, source: GatewayError) -> Self {
        Self::Dispatch {
            event_type: event_type.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeaders | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::Misconfigured(_)
            | Self::Parse(_)
            | Self::Dispatch { .. }
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Returns the message sent to the provider.
    ///
    /// Only the fixed texts leave the process: verification reasons, parse
    /// details and downstream failures are logged server-side but never echoed
    /// back (CWE-209). The event type is safe to expose since the sender chose it.
    pub fn safe_message(&self) -> String {
        match self {
            Self::Misconfigured(_) => "webhook secret not configured".to_string(),
            Self::MissingHeaders => "missing signature headers".to_string(),
            Self::InvalidSignature(_) => "verification failed".to_string(),
            Self::Parse(_) => "malformed event payload".to_string(),
            Self::Dispatch { event_type, .. } => format!("error processing event: {}", event_type),
            Self::Config(_) | Self::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl From<VerificationFailure> for SyncError {
    fn from(failure: VerificationFailure) -> Self {
        Self::InvalidSignature(failure)
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_id = uuid::Uuid::new_v4().to_string();

        if self.is_client_error() {
            tracing::warn!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Webhook rejected"
            );
        } else {
            tracing::error!(
                status = status.as_u16(),
                error_id = %error_id,
                error = %self,
                "Webhook processing failed"
            );
        }

        (status, [(ERROR_ID_HEADER, error_id)], self.safe_message()).into_response()
    }
}

/// Result type alias for webhook processing
pub type Result<T> = std::result::Result<T, SyncError>;
