use std::{process, sync::Arc};

use blobgate::{
    application::{
        auth::AuthGuard, background::BackgroundTasks, error::AppError, gateway::Gateway,
        stores::{CacheStore, ObjectStore},
    },
    cache::{CacheConfig, LruCacheStore},
    config::{self, StoreBackend},
    infra::{
        error::InfraError,
        http::{self, GatewayState, UploadLimits},
        objects::{FsObjectStore, MemoryObjectStore},
        telemetry,
    },
};
use tokio::signal;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let objects = build_object_store(&settings.store)?;

    let cache_config = CacheConfig::from(&settings.cache);
    let cache: Option<Arc<dyn CacheStore>> = if cache_config.enabled {
        Some(Arc::new(LruCacheStore::new(&cache_config)))
    } else {
        None
    };

    let background = BackgroundTasks::new();
    let gateway = Gateway::new(objects, cache, cache_config.policy(), background.clone());

    let auth = AuthGuard::new(settings.auth.secret.clone());
    if !auth.is_configured() {
        warn!(
            target = "blobgate::serve",
            "no auth secret configured; PUT and DELETE will be rejected"
        );
    }

    let max_request_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::validation("uploads.max_request_bytes exceeds usize"))?;
    let state = GatewayState::new(gateway, auth)
        .with_auth_header(settings.auth.header.clone())
        .with_uploads(UploadLimits {
            max_request_bytes,
            file_field: Arc::from(settings.uploads.file_field.as_str()),
        });

    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "blobgate::serve",
        addr = %settings.server.addr,
        backend = ?settings.store.backend,
        cache = cache_config.enabled,
        write_policy = ?cache_config.write_policy,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    background.drain(settings.server.graceful_shutdown).await;

    info!(target = "blobgate::serve", "shutdown complete");
    Ok(())
}

fn build_object_store(store: &config::StoreSettings) -> Result<Arc<dyn ObjectStore>, AppError> {
    match store.backend {
        StoreBackend::Filesystem => {
            let fs = FsObjectStore::new(store.directory.clone())
                .map_err(|err| AppError::from(InfraError::Io(err)))?;
            Ok(Arc::new(fs))
        }
        StoreBackend::Memory => {
            warn!(
                target = "blobgate::serve",
                "memory object store selected; objects are lost on restart"
            );
            Ok(Arc::new(MemoryObjectStore::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(target = "blobgate::serve", error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "blobgate::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "blobgate::serve", "shutdown signal received");
}
