use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct HouseConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub uri: Option<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    /// Base address prepended to object keys. Defaults to the service's own
    /// `/files` route for the local backend.
    pub public_base_url: Option<String>,
    pub gcs_bucket: Option<String>,
    /// Fixed bearer token. Unset means tokens come from the instance
    /// metadata server.
    pub gcs_access_token: Option<String>,
    pub gcs_metadata_token_url: Option<String>,
    pub gcs_api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Gcs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub max_concurrent_requests: usize,
    pub max_upload_bytes: usize,
    /// Insert sample listings at startup when the store is empty.
    pub seed_sample_data: bool,
}

impl HouseConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let database_backend: DatabaseBackend =
            parse_env("DATABASE_BACKEND", Some("mongo"), is_prod)?;
        let uri = match database_backend {
            DatabaseBackend::Mongo => Some(get_env("MONGODB_URI", None, is_prod)?),
            DatabaseBackend::Memory => env::var("MONGODB_URI").ok(),
        };

        let storage_backend: StorageBackend =
            parse_env("STORAGE_BACKEND", Some("local"), is_prod)?;
        let gcs_bucket = match storage_backend {
            StorageBackend::Gcs => Some(get_env("GCS_BUCKET", None, is_prod)?),
            StorageBackend::Local => env::var("GCS_BUCKET").ok(),
        };

        Ok(HouseConfig {
            common: common_config,
            database: DatabaseConfig {
                backend: database_backend,
                uri,
                database: get_env("MONGODB_DATABASE", Some("house_db"), is_prod)?,
            },
            storage: StorageConfig {
                backend: storage_backend,
                local_path: get_env("STORAGE_LOCAL_PATH", Some("storage"), is_prod)?,
                public_base_url: env::var("STORAGE_PUBLIC_BASE_URL").ok(),
                gcs_bucket,
                gcs_access_token: env::var("GCS_ACCESS_TOKEN").ok(),
                gcs_metadata_token_url: env::var("GCS_METADATA_TOKEN_URL").ok(),
                gcs_api_base: env::var("GCS_API_BASE").ok(),
            },
            server: ServerConfig {
                max_concurrent_requests: parse_env("MAX_CONCURRENT_REQUESTS", Some("10"), is_prod)?,
                max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", Some("10485760"), is_prod)?,
                seed_sample_data: env::var("SEED_SAMPLE_DATA")
                    .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
                    .unwrap_or(false),
            },
        })
    }
}

impl FromStr for DatabaseBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(DatabaseBackend::Mongo),
            "memory" => Ok(DatabaseBackend::Memory),
            _ => Err(format!("Invalid database backend: {}", s)),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "gcs" => Ok(StorageBackend::Gcs),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}
