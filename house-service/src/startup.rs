//! Application startup and lifecycle management.
//!
//! Client handles are built once here and injected into the router state.

use crate::config::{DatabaseBackend, HouseConfig, StorageBackend};
use crate::handlers;
use crate::services::storage::GCS_METADATA_TOKEN_URL;
use crate::services::{
    GcsStorage, GcsTokenSource, HouseStore, ImageUploader, LocalStorage, MemoryHouseStore,
    MongoDb, Storage, seed_sample_houses,
};
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: HouseConfig,
    pub store: Arc<dyn HouseStore>,
    pub uploader: ImageUploader,
}

pub fn build_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/houses",
            post(handlers::create_house).get(handlers::list_houses),
        )
        .route(
            "/houses/:id",
            put(handlers::update_house).delete(handlers::delete_house),
        )
        .route(
            "/uploads",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(server.max_upload_bytes)),
        );

    if state.config.storage.backend == StorageBackend::Local {
        router = router.nest_service("/files", ServeDir::new(&state.config.storage.local_path));
    }

    router
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers(Any),
        )
        .layer(GlobalConcurrencyLimitLayer::new(server.max_concurrent_requests))
}

pub async fn connect_store(config: &HouseConfig) -> Result<Arc<dyn HouseStore>, AppError> {
    match config.database.backend {
        DatabaseBackend::Mongo => {
            let uri = config.database.uri.as_deref().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("MONGODB_URI is required for the mongo backend"))
            })?;
            let db = MongoDb::connect(uri, &config.database.database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            Ok(Arc::new(db))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory house store; data will not survive a restart");
            Ok(Arc::new(MemoryHouseStore::new()))
        }
    }
}

/// `port` is the bound listener port, used for the local backend's default
/// public base address.
pub async fn build_storage(config: &HouseConfig, port: u16) -> Result<Arc<dyn Storage>, AppError> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => {
            let public_base_url = storage
                .public_base_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}/files", port));
            let local = LocalStorage::new(&storage.local_path, public_base_url)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        storage.local_path,
                        e
                    );
                    e
                })?;
            Ok(Arc::new(local))
        }
        StorageBackend::Gcs => {
            let bucket = storage.gcs_bucket.clone().ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!("GCS_BUCKET is required for the gcs backend"))
            })?;
            let token_source = match &storage.gcs_access_token {
                Some(token) => {
                    tracing::warn!("Using a fixed GCS access token; uploads fail once it expires");
                    GcsTokenSource::Static(token.clone())
                }
                None => GcsTokenSource::Metadata {
                    url: storage
                        .gcs_metadata_token_url
                        .clone()
                        .unwrap_or_else(|| GCS_METADATA_TOKEN_URL.to_string()),
                },
            };
            tracing::info!(bucket = %bucket, "Using Google Cloud Storage");
            Ok(Arc::new(GcsStorage::with_token_source(
                bucket,
                token_source,
                storage.gcs_api_base.clone(),
            )))
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: HouseConfig) -> Result<Self, AppError> {
        let store = connect_store(&config).await?;
        if config.server.seed_sample_data {
            seed_sample_houses(store.as_ref()).await?;
        }

        // Bind first so port 0 resolves before storage derives its URLs
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let storage = build_storage(&config, port).await?;

        let state = AppState {
            config,
            store,
            uploader: ImageUploader::new(storage),
        };
        let router = build_router(state.clone());

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> Arc<dyn HouseStore> {
        self.state.store.clone()
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}
