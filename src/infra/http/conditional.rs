//! Content tags and `If-None-Match` revalidation for reads.

use axum::{
    body::Body,
    http::{
        HeaderValue, Method, Request, StatusCode,
        header::{CONTENT_LENGTH, ETAG, IF_NONE_MATCH},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;

use crate::{application::error::HttpError, domain::ContentTag};

const SOURCE: &str = "infra::http::conditional";

/// Tag successful reads with a strong ETag and answer matching
/// `If-None-Match` requests with `304 Not Modified`.
///
/// Only the response body is hashed; the stores are never consulted.
pub async fn conditional_get(mut request: Request<Body>, next: Next) -> Response {
    match *request.method() {
        Method::GET => {}
        // The router empties HEAD bodies once the response leaves this layer,
        // so hash the body GET would send and let the router drop it.
        Method::HEAD => *request.method_mut() = Method::GET,
        _ => return next.run(request).await,
    }

    let if_none_match = request
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                format!("failed to buffer response body: {err}"),
            )
            .into_response();
        }
    };

    let tag = ContentTag::compute(&bytes);
    if let Ok(value) = HeaderValue::from_str(&tag.to_header_value()) {
        parts.headers.insert(ETAG, value);
    }

    if if_none_match.is_some_and(|header| tag.matches_if_none_match(&header)) {
        parts.status = StatusCode::NOT_MODIFIED;
        parts.headers.remove(CONTENT_LENGTH);
        return Response::from_parts(parts, Body::empty());
    }

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use axum::{Router, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { "hello" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn(conditional_get))
    }

    fn etag_of(body: &[u8]) -> String {
        ContentTag::compute(body).to_header_value()
    }

    #[tokio::test]
    async fn attaches_etag_to_successful_reads() {
        let response = app()
            .oneshot(Request::get("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ETAG).unwrap().to_str().unwrap(),
            etag_of(b"hello")
        );
    }

    #[tokio::test]
    async fn matching_tag_short_circuits() {
        let response = app()
            .oneshot(
                Request::get("/ok")
                    .header(IF_NONE_MATCH, etag_of(b"hello"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn stale_tag_gets_full_body() {
        let response = app()
            .oneshot(
                Request::get("/ok")
                    .header(IF_NONE_MATCH, "\"stale\"")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn head_uses_tag_of_full_body() {
        let response = app()
            .oneshot(Request::head("/ok").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ETAG).unwrap().to_str().unwrap(),
            etag_of(b"hello")
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn errors_pass_through_untagged() {
        let response = app()
            .oneshot(
                Request::get("/missing")
                    .header(IF_NONE_MATCH, "*")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(ETAG).is_none());
    }
}
