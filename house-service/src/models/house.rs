use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};
use service_core::error::AppError;
use uuid::Uuid;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Keys the store assigns itself; caller-supplied values are dropped.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, "id", CREATED_AT_FIELD];

/// A stored listing.
///
/// Only the identifier and creation time are fixed. Everything else, the
/// well-known `title`/`description`/`price`/`location`/`imageUrl` included,
/// lives in `fields` so unrecognized keys survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct House {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub fields: Document,
}

/// Result of a partial update: the target id and exactly the fields written.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub id: String,
    pub fields: Document,
}

impl House {
    pub fn new(fields: Document) -> Self {
        Self {
            // v7 ids sort by creation time, which breaks createdAt ties
            id: Uuid::now_v7().to_string(),
            // millisecond precision, same as what the store keeps
            created_at: bson::DateTime::now().to_chrono(),
            fields: strip_reserved(fields),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut document = doc! {
            "_id": self.id.clone(),
            "createdAt": bson::DateTime::from_chrono(self.created_at),
        };
        for (key, value) in &self.fields {
            document.insert(key.clone(), value.clone());
        }
        document
    }

    pub fn from_document(mut document: Document) -> Result<Self, AppError> {
        let id = match document.remove(ID_FIELD) {
            Some(Bson::String(id)) => id,
            other => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "House document has an invalid _id: {:?}",
                    other
                )))
            }
        };

        let created_at = match document.remove(CREATED_AT_FIELD) {
            Some(Bson::DateTime(created_at)) => created_at.to_chrono(),
            other => {
                return Err(AppError::DatabaseError(anyhow::anyhow!(
                    "House {} has an invalid createdAt: {:?}",
                    id,
                    other
                )))
            }
        };

        Ok(Self {
            id,
            created_at,
            fields: strip_reserved(document),
        })
    }

    /// Merge `patch` over the current fields.
    pub fn apply(&mut self, patch: &Document) {
        for (key, value) in patch {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get_str("title").ok()
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.get_str("description").ok()
    }

    pub fn location(&self) -> Option<&str> {
        self.fields.get_str("location").ok()
    }

    pub fn image_url(&self) -> Option<&str> {
        self.fields.get_str("imageUrl").ok()
    }

    pub fn price(&self) -> Option<f64> {
        match self.fields.get("price") {
            Some(Bson::Double(price)) => Some(*price),
            Some(Bson::Int32(price)) => Some(f64::from(*price)),
            Some(Bson::Int64(price)) => Some(*price as f64),
            _ => None,
        }
    }
}

/// Top-level keys must be literal field names for every store: no empty
/// key, no `.` (a nested path inside `$set`) and no leading `$` (an operator).
pub fn check_field_names(fields: &Document) -> Result<(), AppError> {
    match fields
        .keys()
        .find(|key| key.is_empty() || key.contains('.') || key.starts_with('$'))
    {
        Some(key) => Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid field name: {:?}",
            key
        ))),
        None => Ok(()),
    }
}

pub fn strip_reserved(mut fields: Document) -> Document {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}
