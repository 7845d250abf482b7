use super::database::{missing_house, HouseStore};
use crate::models::{check_field_names, strip_reserved, AppliedUpdate, House};
use async_trait::async_trait;
use mongodb::bson::Document;
use service_core::error::AppError;
use std::sync::{Mutex, MutexGuard};

/// Process-local house store for development and tests.
///
/// Same observable semantics as the MongoDB store. Records are kept in
/// insertion order and nothing survives a restart.
#[derive(Default)]
pub struct MemoryHouseStore {
    houses: Mutex<Vec<House>>,
}

impl MemoryHouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn houses(&self) -> Result<MutexGuard<'_, Vec<House>>, AppError> {
        self.houses
            .lock()
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("House store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl HouseStore for MemoryHouseStore {
    async fn create(&self, fields: Document) -> Result<House, AppError> {
        check_field_names(&fields)?;
        let house = House::new(fields);
        self.houses()?.push(house.clone());
        Ok(house)
    }

    async fn list(&self) -> Result<Vec<House>, AppError> {
        let mut houses: Vec<House> = self.houses()?.iter().rev().cloned().collect();
        // stable sort: equal timestamps keep newest-inserted first
        houses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(houses)
    }

    async fn update(&self, id: &str, fields: Document) -> Result<AppliedUpdate, AppError> {
        let fields = strip_reserved(fields);
        check_field_names(&fields)?;
        let mut houses = self.houses()?;
        let house = houses
            .iter_mut()
            .find(|house| house.id == id)
            .ok_or_else(|| missing_house(id))?;

        house.apply(&fields);

        Ok(AppliedUpdate {
            id: id.to_string(),
            fields,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.houses()?.retain(|house| house.id != id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.houses().map(|_| ())
    }
}
