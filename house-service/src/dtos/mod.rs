pub mod houses;
pub mod uploads;

pub use houses::{DeleteHouseResponse, HousePayload, HouseResponse, UpdateHouseResponse};
pub use uploads::UploadResponse;
