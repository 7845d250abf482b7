pub mod health;
pub mod houses;
pub mod uploads;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use houses::{create_house, delete_house, list_houses, update_house};
pub use uploads::upload_image;
