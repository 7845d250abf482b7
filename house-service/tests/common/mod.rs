#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use house_service::config::{
    DatabaseBackend, DatabaseConfig, HouseConfig, ServerConfig, StorageBackend, StorageConfig,
};
use house_service::services::{
    HouseStore, ImageUploader, LocalStorage, MemoryHouseStore, Storage,
};
use house_service::startup::{build_router, AppState, Application};
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use uuid::Uuid;

pub const PUBLIC_BASE_URL: &str = "http://cdn.test/files";

/// In-memory store, local storage in a scratch directory, random port.
pub fn test_config() -> HouseConfig {
    HouseConfig {
        common: CoreConfig {
            port: 0,
            log_level: "error".to_string(),
            otlp_endpoint: None,
        },
        database: DatabaseConfig {
            backend: DatabaseBackend::Memory,
            uri: None,
            database: format!("house_test_{}", Uuid::new_v4()),
        },
        storage: StorageConfig {
            backend: StorageBackend::Local,
            local_path: format!("target/test-storage-{}", Uuid::new_v4()),
            public_base_url: None,
            gcs_bucket: None,
            gcs_access_token: None,
            gcs_metadata_token_url: None,
            gcs_api_base: None,
        },
        server: ServerConfig {
            max_concurrent_requests: 10,
            max_upload_bytes: 1024 * 1024,
            seed_sample_data: false,
        },
    }
}

/// Router wired to a fresh in-memory store, for `oneshot` tests.
pub struct TestRouter {
    pub router: Router,
    pub storage_path: String,
}

impl TestRouter {
    pub async fn new() -> Self {
        let config = test_config();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.storage.local_path, PUBLIC_BASE_URL)
                .await
                .expect("Failed to create local storage"),
        );
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: HouseConfig, storage: Arc<dyn Storage>) -> Self {
        Self::with_parts(config, Arc::new(MemoryHouseStore::new()), storage)
    }

    pub async fn with_store(store: Arc<dyn HouseStore>) -> Self {
        let config = test_config();
        let storage: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(&config.storage.local_path, PUBLIC_BASE_URL)
                .await
                .expect("Failed to create local storage"),
        );
        Self::with_parts(config, store, storage)
    }

    fn with_parts(
        config: HouseConfig,
        store: Arc<dyn HouseStore>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let storage_path = config.storage.local_path.clone();
        let state = AppState {
            config,
            store,
            uploader: ImageUploader::new(storage),
        };

        Self {
            router: build_router(state),
            storage_path,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed to respond")
    }

    pub async fn send_json(&self, method: &str, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// A running server on a random port.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage_path: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: HouseConfig) -> Self {
        let storage_path = config.storage.local_path.clone();

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            storage_path,
        }
    }

    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
    }
}
