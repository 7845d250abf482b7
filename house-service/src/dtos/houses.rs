use crate::models::{AppliedUpdate, House, RESERVED_FIELDS};
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::error::AppError;

/// Body of `POST /houses` and `PUT /houses/:id`.
///
/// Any JSON object. The known listing fields must hold their JSON type or
/// `null`; everything else is kept as sent. A `PUT` writes exactly the keys
/// present, explicit `null`s included.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct HousePayload {
    fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for HousePayload {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        for (key, value) in &fields {
            let well_typed = match key.as_str() {
                "title" | "description" | "location" | "imageUrl" => {
                    value.is_string() || value.is_null()
                }
                "price" => value.is_number() || value.is_null(),
                _ => true,
            };
            if !well_typed {
                return Err(format!("invalid type for field `{}`", key));
            }
        }
        Ok(Self { fields })
    }
}

impl HousePayload {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert to the stored field set. Store-assigned keys are dropped.
    pub fn into_document(self) -> Result<Document, AppError> {
        let mut fields = Document::new();

        for (key, value) in self.fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let value = bson::to_bson(&value).map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Field {} cannot be stored: {}", key, e))
            })?;
            fields.insert(key, value);
        }

        Ok(fields)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HouseResponse {
    pub id: String,
    pub created_at: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<House> for HouseResponse {
    fn from(house: House) -> Self {
        Self {
            id: house.id,
            created_at: house.created_at.to_rfc3339(),
            fields: document_to_json(house.fields),
        }
    }
}

/// `PUT /houses/:id` answers with the id and the fields it wrote, not the
/// merged record.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateHouseResponse {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl From<AppliedUpdate> for UpdateHouseResponse {
    fn from(update: AppliedUpdate) -> Self {
        Self {
            id: update.id,
            fields: document_to_json(update.fields),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteHouseResponse {
    pub success: bool,
}

fn document_to_json(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| (key, value.into_relaxed_extjson()))
        .collect()
}
