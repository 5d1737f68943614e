//! PUT request bodies.
//!
//! A request is either a raw payload or a multipart form carrying one file
//! field. The variant is chosen solely from the `Content-Type` header.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
};

use crate::{application::error::GatewayError, domain::Blob};

use super::GatewayState;

const MULTIPART_FORM: &str = "multipart/form-data";

#[derive(Debug)]
pub enum PutPayload {
    /// Entire body, with the request content type if one was sent.
    Raw(Blob),
    /// The configured file field of a multipart form.
    Multipart(Blob),
}

fn is_multipart(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(MULTIPART_FORM))
}

impl FromRequest<GatewayState> for PutPayload {
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &GatewayState) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        if content_type.as_deref().is_some_and(is_multipart) {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|rejection| GatewayError::malformed(rejection.body_text()))?;
            let blob = read_file_field(&mut multipart, &state.uploads.file_field).await?;
            return Ok(PutPayload::Multipart(blob));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                GatewayError::PayloadTooLarge
            } else {
                GatewayError::malformed(rejection.body_text())
            }
        })?;

        Ok(PutPayload::Raw(Blob::new(bytes, content_type)))
    }
}

async fn read_file_field(multipart: &mut Multipart, name: &str) -> Result<Blob, GatewayError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(name) {
            continue;
        }

        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Blob::new(bytes, content_type));
    }

    Err(GatewayError::malformed(format!(
        "multipart body has no `{name}` field"
    )))
}

fn multipart_error(err: MultipartError) -> GatewayError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => GatewayError::PayloadTooLarge,
        _ => GatewayError::malformed(err.body_text()),
    }
}
