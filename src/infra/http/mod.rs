mod auth;
mod conditional;
mod handlers;
mod middleware;
mod payload;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
};

use crate::application::{auth::AuthGuard, gateway::Gateway};

pub use auth::require_credential;
pub use conditional::conditional_get;
pub use handlers::X_CACHE;
pub use middleware::{AuthOutcome, RequestContext, X_REQUEST_ID, trace_requests};
pub use payload::PutPayload;

/// Default header carrying the shared secret on mutating requests.
pub const DEFAULT_AUTH_HEADER: &str = "x-custom-auth-key";

/// Default multipart field holding the uploaded object.
pub const DEFAULT_FILE_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct UploadLimits {
    /// Maximum accepted PUT body, multipart framing included.
    pub max_request_bytes: usize,
    pub file_field: Arc<str>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_request_bytes: 10 * 1024 * 1024,
            file_field: Arc::from(DEFAULT_FILE_FIELD),
        }
    }
}

/// Everything the router needs, injected once at construction.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Gateway,
    pub auth: AuthGuard,
    pub auth_header: HeaderName,
    pub uploads: UploadLimits,
}

impl GatewayState {
    pub fn new(gateway: Gateway, auth: AuthGuard) -> Self {
        Self {
            gateway,
            auth,
            auth_header: HeaderName::from_static(DEFAULT_AUTH_HEADER),
            uploads: UploadLimits::default(),
        }
    }

    pub fn with_auth_header(mut self, header: HeaderName) -> Self {
        self.auth_header = header;
        self
    }

    pub fn with_uploads(mut self, uploads: UploadLimits) -> Self {
        self.uploads = uploads;
        self
    }
}

pub fn build_router(state: GatewayState) -> Router {
    // Layers run bottom-up: the credential check precedes tagging.
    let objects = Router::new()
        .route(
            "/{*key}",
            get(handlers::read_object)
                .put(handlers::write_object)
                .delete(handlers::delete_object)
                .fallback(handlers::method_not_allowed),
        )
        .route("/", any(handlers::missing_key))
        .layer(from_fn(conditional_get))
        .layer(from_fn_with_state(state.clone(), require_credential))
        .layer(DefaultBodyLimit::max(state.uploads.max_request_bytes));

    Router::new()
        .route("/_health", get(handlers::health))
        .merge(objects)
        .with_state(state)
        .layer(from_fn(trace_requests))
}
