use std::{collections::HashSet, sync::Arc};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use blobgate::{
    application::{
        auth::AuthGuard,
        background::BackgroundTasks,
        gateway::{CachePolicy, Gateway},
        stores::{CacheStore, ObjectStore},
    },
    cache::{CacheConfig, LruCacheStore},
    domain::{Blob, ObjectKey},
    infra::{
        http::{GatewayState, build_router},
        objects::MemoryObjectStore,
    },
};
use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use tower::ServiceExt;

#[tokio::test]
async fn request_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let objects = Arc::new(MemoryObjectStore::new());
    for raw in ["one", "two"] {
        let key = ObjectKey::parse(raw).expect("valid key");
        objects
            .put(&key, Blob::new(Bytes::from(raw.as_bytes().to_vec()), None))
            .await
            .expect("seed object");
    }

    // One slot forces an eviction once the second key is populated.
    let cache_config = CacheConfig {
        capacity: 1,
        ..Default::default()
    };
    let cache: Arc<dyn CacheStore> = Arc::new(LruCacheStore::new(&cache_config));
    let object_store: Arc<dyn ObjectStore> = objects;
    let background = BackgroundTasks::new();
    let gateway = Gateway::new(
        object_store,
        Some(cache),
        CachePolicy::default(),
        background.clone(),
    );
    let app = build_router(GatewayState::new(gateway, AuthGuard::new(None)));

    for uri in ["/one", "/one", "/two", "/missing"] {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request should build");
        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        assert_ne!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        background.wait_idle().await;
    }

    // No secret is configured, so the credential check refuses every PUT.
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/one")
        .body(Body::from("overwrite"))
        .expect("request should build");
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "blobgate_cache_hit_total",
        "blobgate_cache_miss_total",
        "blobgate_cache_evict_total",
        "blobgate_store_read_total",
        "blobgate_auth_rejected_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
