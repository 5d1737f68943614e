//! Credential check for mutating requests.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::application::error::GatewayError;

use super::GatewayState;

/// Reject PUT and DELETE requests whose credential header does not match.
///
/// Runs before the handler, so a rejected request never reaches either
/// store. Methods the router does not serve fall through to its 405.
pub async fn require_credential(
    State(state): State<GatewayState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::PUT | Method::DELETE) {
        return next.run(request).await;
    }

    let verdict = state.auth.check(
        request.method(),
        request
            .headers()
            .get(&state.auth_header)
            .map(|value| value.as_bytes()),
    );

    match verdict {
        Ok(()) => next.run(request).await,
        Err(err) => GatewayError::from(err).into_response(),
    }
}
