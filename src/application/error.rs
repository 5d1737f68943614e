use std::error::Error as StdError;

use axum::{
    http::{HeaderValue, Method, StatusCode, header::ALLOW},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{auth::AuthError, stores::StoreError},
    domain::KeyError,
    infra::error::InfraError,
};

/// Diagnostic attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

/// Methods routed to a handler; advertised in `Allow` on 405 responses.
pub const ALLOWED_METHODS: &str = "GET, HEAD, PUT, DELETE";

/// Failures surfaced by the gateway to HTTP callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("object `{key}` not found")]
    NotFound { key: String },
    #[error("method `{method}` not allowed")]
    MethodNotAllowed { method: Method },
    #[error("invalid object key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("malformed request: {0}")]
    Malformed(String),
    #[error("request body exceeds configured limit")]
    PayloadTooLarge,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GatewayError {
    pub fn not_found(key: impl ToString) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidKey(_) | GatewayError::Malformed(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized(_) => "Unauthorized",
            GatewayError::NotFound { .. } => "Object Not Found",
            GatewayError::MethodNotAllowed { .. } => "Method Not Allowed",
            GatewayError::InvalidKey(_) => "Invalid object key",
            GatewayError::Malformed(_) => "Malformed request",
            GatewayError::PayloadTooLarge => "Payload too large",
            GatewayError::Store(_) => "Storage failure",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::error::GatewayError", status, &self);
        let mut response = (status, self.presentation_message()).into_response();
        if matches!(self, GatewayError::MethodNotAllowed { .. }) {
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
        }
        report.attach(&mut response);
        response
    }
}

/// Errors terminating the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            GatewayError::from(AuthError::Missing).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::not_found("a").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::MethodNotAllowed {
                method: Method::POST
            }
            .status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::malformed("missing file").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::from(StoreError::unavailable("down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn method_not_allowed_advertises_allow_header() {
        let response = GatewayError::MethodNotAllowed {
            method: Method::PATCH,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(ALLOW).and_then(|v| v.to_str().ok()),
            Some(ALLOWED_METHODS)
        );
    }

    #[test]
    fn responses_carry_error_report() {
        let response = GatewayError::from(StoreError::unavailable("disk full")).into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");

        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(report.messages[0].contains("disk full"));
    }
}
