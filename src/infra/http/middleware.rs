use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use metrics::counter;
use tracing::{Instrument, debug, error, info_span, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::handlers::X_CACHE;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const TARGET: &str = "blobgate::http::request";
const MAX_INBOUND_ID: usize = 128;

/// Per-request identity, visible to handlers and attached to the response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Object key as addressed by the path, before validation.
    pub key: String,
}

/// How the credential check treated a request, judged from the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    NotRequired,
    Granted,
    Rejected,
}

impl AuthOutcome {
    pub fn classify(method: &Method, status: StatusCode) -> Self {
        if *method != Method::PUT && *method != Method::DELETE {
            return Self::NotRequired;
        }
        if status == StatusCode::UNAUTHORIZED {
            Self::Rejected
        } else {
            Self::Granted
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Granted => "granted",
            Self::Rejected => "rejected",
        }
    }
}

/// Assigns the request id, runs the request inside a span keyed by object,
/// and logs the outcome with the cache source and auth result.
pub async fn trace_requests(mut request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let ctx = RequestContext {
        request_id: inbound_request_id(request.headers())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        key: request.uri().path().trim_start_matches('/').to_string(),
    };
    request.extensions_mut().insert(ctx.clone());

    let span = info_span!(
        target: TARGET,
        "request",
        request_id = %ctx.request_id,
        method = %method,
        key = %ctx.key,
    );
    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let elapsed_ms = start.elapsed().as_millis();

    let status = response.status();
    let auth = AuthOutcome::classify(&method, status);
    if auth == AuthOutcome::Rejected {
        counter!("blobgate_auth_rejected_total").increment(1);
    }
    let report = response.extensions_mut().remove::<ErrorReport>();
    let x_cache = response
        .headers()
        .get(X_CACHE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");
    span.in_scope(|| log_outcome(status, elapsed_ms, auth, x_cache, report));

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

fn log_outcome(
    status: StatusCode,
    elapsed_ms: u128,
    auth: AuthOutcome,
    x_cache: &str,
    report: Option<ErrorReport>,
) {
    if status.is_success() || status.is_redirection() {
        debug!(
            target: TARGET,
            status = status.as_u16(),
            elapsed_ms,
            auth = auth.as_str(),
            x_cache,
            "request served",
        );
        return;
    }

    let (source, chain) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    if status.is_server_error() {
        error!(
            target: TARGET,
            status = status.as_u16(),
            elapsed_ms,
            auth = auth.as_str(),
            source,
            chain = ?chain,
            "request failed",
        );
    } else {
        warn!(
            target: TARGET,
            status = status.as_u16(),
            elapsed_ms,
            auth = auth.as_str(),
            source,
            chain = ?chain,
            "request rejected",
        );
    }
}

fn inbound_request_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(X_REQUEST_ID)?.to_str().ok()?.trim();
    let usable = !value.is_empty()
        && value.len() <= MAX_INBOUND_ID
        && value.chars().all(|c| c.is_ascii_graphic());
    usable.then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        Router::new()
            .route(
                "/{*key}",
                get(|Extension(ctx): Extension<RequestContext>| async move { ctx.key })
                    .put(|| async { StatusCode::UNAUTHORIZED }),
            )
            .layer(middleware::from_fn(trace_requests))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn handlers_see_key_and_response_carries_request_id() {
        let response = app()
            .oneshot(Request::get("/docs/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response
            .headers()
            .get(X_REQUEST_ID)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&id).is_ok());
        let ctx = response.extensions().get::<RequestContext>().unwrap();
        assert_eq!(ctx.request_id, id);
        assert_eq!(body_text(response).await, "docs/a.txt");
    }

    #[tokio::test]
    async fn usable_inbound_request_id_is_echoed() {
        let response = app()
            .oneshot(
                Request::get("/k")
                    .header(X_REQUEST_ID, "edge-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers().get(X_REQUEST_ID).unwrap(), "edge-42");

        let response = app()
            .oneshot(
                Request::get("/k")
                    .header(X_REQUEST_ID, "has spaces")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_ne!(response.headers().get(X_REQUEST_ID).unwrap(), "has spaces");
    }

    #[tokio::test]
    async fn rejected_mutation_still_gets_request_id() {
        let response = app()
            .oneshot(Request::put("/k").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[test]
    fn auth_outcome_follows_method_and_status() {
        let cases = [
            (Method::GET, StatusCode::UNAUTHORIZED, AuthOutcome::NotRequired),
            (Method::HEAD, StatusCode::OK, AuthOutcome::NotRequired),
            (Method::PUT, StatusCode::OK, AuthOutcome::Granted),
            (Method::PUT, StatusCode::UNAUTHORIZED, AuthOutcome::Rejected),
            (Method::DELETE, StatusCode::INTERNAL_SERVER_ERROR, AuthOutcome::Granted),
            (Method::DELETE, StatusCode::UNAUTHORIZED, AuthOutcome::Rejected),
        ];
        for (method, status, expected) in cases {
            assert_eq!(AuthOutcome::classify(&method, status), expected, "{method} {status}");
        }
    }
}
