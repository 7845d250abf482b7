pub mod database;
pub mod memory;
pub mod metrics;
pub mod seed;
pub mod storage;
pub mod upload;

pub use database::{HouseStore, MongoDb};
pub use memory::MemoryHouseStore;
pub use self::metrics::{get_metrics, init_metrics};
pub use seed::seed_sample_houses;
pub use storage::{GcsStorage, GcsTokenSource, LocalStorage, Storage};
pub use upload::{ImageUploader, UploadedImage};
