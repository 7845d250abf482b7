use super::database::HouseStore;
use mongodb::bson::{doc, Document};
use service_core::error::AppError;

/// Listings for a fresh development store.
pub fn sample_houses() -> Vec<Document> {
    vec![
        doc! {
            "title": "2 Bedroom Apartment in Kilimani",
            "description": "Modern 2 bedroom apartment with balcony and parking.",
            "price": 45000_i64,
            "location": "Kilimani",
        },
        doc! {
            "title": "Bedsitter in Rongai",
            "description": "Affordable single room with running water.",
            "price": 12000_i64,
            "location": "Rongai",
        },
        doc! {
            "title": "1 Bedroom in Westlands",
            "description": "Cozy 1 bedroom close to malls and restaurants.",
            "price": 35000_i64,
            "location": "Westlands",
        },
    ]
}

/// Insert the sample listings if the store is empty. Returns how many were
/// inserted; a store that already has houses is left alone.
pub async fn seed_sample_houses(store: &dyn HouseStore) -> Result<usize, AppError> {
    if !store.list().await?.is_empty() {
        tracing::info!("House store already populated, skipping sample data");
        return Ok(0);
    }

    let houses = sample_houses();
    let count = houses.len();
    for fields in houses {
        store.create(fields).await?;
    }

    tracing::info!(count = count, "Seeded sample houses");
    Ok(count)
}
