use crate::models::{check_field_names, strip_reserved, AppliedUpdate, House};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

pub const HOUSES_COLLECTION: &str = "houses";

/// CRUD access to the house collection.
///
/// Implementations do no validation and no retries; failures propagate to
/// the caller unchanged.
#[async_trait]
pub trait HouseStore: Send + Sync {
    /// Persist `fields` as a new house with a fresh id and creation time.
    async fn create(&self, fields: Document) -> Result<House, AppError>;

    /// Every house, newest first.
    async fn list(&self) -> Result<Vec<House>, AppError>;

    /// Merge `fields` into an existing house. Fails if `id` is unknown.
    async fn update(&self, id: &str, fields: Document) -> Result<AppliedUpdate, AppError>;

    /// Remove a house. Unknown ids are not an error.
    async fn delete(&self, id: &str) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

pub(crate) fn missing_house(id: &str) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("No house with id {}", id))
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for house-service");

        // Listing sorts on createdAt, newest first
        let created_at_index = IndexModel::builder()
            .keys(doc! { "createdAt": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_desc".to_string())
                    .build(),
            )
            .build();

        self.houses()
            .create_index(created_at_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create createdAt index on houses collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created index on houses.createdAt");

        Ok(())
    }

    pub fn houses(&self) -> Collection<Document> {
        self.db.collection(HOUSES_COLLECTION)
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl HouseStore for MongoDb {
    async fn create(&self, fields: Document) -> Result<House, AppError> {
        check_field_names(&fields)?;
        let house = House::new(fields);

        self.houses()
            .insert_one(house.to_document(), None)
            .await
            .map_err(|e| {
                tracing::error!(house_id = %house.id, "Failed to insert house: {}", e);
                AppError::from(e)
            })?;

        Ok(house)
    }

    async fn list(&self) -> Result<Vec<House>, AppError> {
        let find_options = FindOptions::builder()
            .sort(doc! { "createdAt": -1, "_id": -1 })
            .build();

        let mut cursor = self
            .houses()
            .find(doc! {}, find_options)
            .await
            .map_err(AppError::from)?;

        let mut houses = Vec::new();
        while let Some(document) = cursor.try_next().await.map_err(AppError::from)? {
            houses.push(House::from_document(document)?);
        }

        Ok(houses)
    }

    async fn update(&self, id: &str, fields: Document) -> Result<AppliedUpdate, AppError> {
        let fields = strip_reserved(fields);
        check_field_names(&fields)?;

        // `$set` rejects an empty document, so an empty patch is only an
        // existence check
        let matched = if fields.is_empty() {
            self.houses()
                .count_documents(doc! { "_id": id }, None)
                .await
                .map_err(AppError::from)?
        } else {
            self.houses()
                .update_one(doc! { "_id": id }, doc! { "$set": fields.clone() }, None)
                .await
                .map_err(|e| {
                    tracing::error!(house_id = %id, "Failed to update house: {}", e);
                    AppError::from(e)
                })?
                .matched_count
        };

        if matched == 0 {
            return Err(missing_house(id));
        }

        Ok(AppliedUpdate {
            id: id.to_string(),
            fields,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.houses()
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| {
                tracing::error!(house_id = %id, "Failed to delete house: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}
