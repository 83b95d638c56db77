//! Mapping of domain errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::domain::errors::DomainError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Stable error code.
    pub code: String,
}

/// Error returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// No caller identity on the request.
    Unauthorized,
    /// Domain failure.
    Domain(DomainError),
}

impl ApiError {
    /// HTTP status and code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Domain(e) => match e {
                DomainError::TriggerNotFound(_)
                | DomainError::ProviderNotFound(_)
                | DomainError::RunNotFound(_)
                | DomainError::AgentNotFound(_)
                | DomainError::WorkflowNotFound(_)
                | DomainError::ThreadNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                DomainError::Configuration(_) => (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR"),
                DomainError::ValidationFailed(_)
                | DomainError::InvalidTriggerResult(_)
                | DomainError::WorkflowInactive(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                DomainError::AccessDenied(_) => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
                DomainError::BillingDenied(_) => (StatusCode::PAYMENT_REQUIRED, "BILLING_ERROR"),
                DomainError::ProviderSetup(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_SETUP_ERROR"),
                DomainError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR"),
                DomainError::DatabaseError(_)
                | DomainError::SerializationError(_)
                | DomainError::ControlPlane(_)
                | DomainError::ExecutionFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error = match &self {
            Self::Unauthorized => "missing X-Account-Id header".to_string(),
            Self::Domain(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %error, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;
