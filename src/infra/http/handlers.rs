//! Object route handlers.

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{CONTENT_TYPE, HeaderName},
        request::Parts,
    },
    response::{IntoResponse, Response},
};

use crate::{
    application::{error::GatewayError, gateway::ReadOutcome},
    domain::ObjectKey,
};

use super::{GatewayState, payload::PutPayload};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Object key taken from the wildcard path segment.
pub struct KeyPath(pub ObjectKey);

impl<S> FromRequestParts<S> for KeyPath
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| GatewayError::malformed(rejection.body_text()))?;
        Ok(Self(ObjectKey::parse(raw)?))
    }
}

pub async fn read_object(
    State(state): State<GatewayState>,
    KeyPath(key): KeyPath,
) -> Result<Response, GatewayError> {
    let outcome = state.gateway.read(&key).await?;
    Ok(object_response(&key, outcome))
}

pub async fn write_object(
    State(state): State<GatewayState>,
    KeyPath(key): KeyPath,
    payload: PutPayload,
) -> Result<Response, GatewayError> {
    match payload {
        PutPayload::Raw(blob) => {
            state.gateway.write(&key, blob).await?;
            Ok((StatusCode::OK, format!("Put {key} successfully!")).into_response())
        }
        PutPayload::Multipart(blob) => {
            state.gateway.write(&key, blob).await?;
            Ok(StatusCode::OK.into_response())
        }
    }
}

pub async fn delete_object(
    State(state): State<GatewayState>,
    KeyPath(key): KeyPath,
) -> Result<Response, GatewayError> {
    state.gateway.delete(&key).await?;
    Ok((StatusCode::OK, format!("Deleted {key} successfully!")).into_response())
}

pub async fn method_not_allowed(method: Method) -> GatewayError {
    GatewayError::MethodNotAllowed { method }
}

/// Root path: supported methods need a key, others are not allowed.
pub async fn missing_key(method: Method) -> GatewayError {
    match method {
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE => {
            GatewayError::malformed("request path does not name an object key")
        }
        method => GatewayError::MethodNotAllowed { method },
    }
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn object_response(key: &ObjectKey, outcome: ReadOutcome) -> Response {
    let ReadOutcome { blob, source } = outcome;
    let content_type = blob
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| {
            let mime = mime_guess::from_path(key.as_str()).first_or_octet_stream();
            HeaderValue::from_str(mime.as_ref())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
        });

    let mut response = Response::new(axum::body::Body::from(blob.bytes));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(X_CACHE, HeaderValue::from_static(source.as_str()));
    response
}
