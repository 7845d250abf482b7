use crate::dtos::{DeleteHouseResponse, HousePayload, HouseResponse, UpdateHouseResponse};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use metrics::counter;
use service_core::error::AppError;

pub async fn create_house(
    State(state): State<AppState>,
    Json(payload): Json<HousePayload>,
) -> Result<impl IntoResponse, AppError> {
    let fields = payload.into_document()?;
    let house = state.store.create(fields).await?;

    counter!("houses_created_total").increment(1);
    tracing::info!(house_id = %house.id, "House created");

    Ok((StatusCode::CREATED, Json(HouseResponse::from(house))))
}

pub async fn list_houses(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let houses: Vec<HouseResponse> = state
        .store
        .list()
        .await?
        .into_iter()
        .map(HouseResponse::from)
        .collect();

    Ok(Json(houses))
}

pub async fn update_house(
    State(state): State<AppState>,
    Path(house_id): Path<String>,
    Json(payload): Json<HousePayload>,
) -> Result<impl IntoResponse, AppError> {
    let fields = payload.into_document()?;
    let applied = state.store.update(&house_id, fields).await?;

    tracing::info!(
        house_id = %applied.id,
        applied_fields = applied.fields.len(),
        "House updated"
    );

    Ok(Json(UpdateHouseResponse::from(applied)))
}

pub async fn delete_house(
    State(state): State<AppState>,
    Path(house_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.store.delete(&house_id).await?;

    tracing::info!(house_id = %house_id, "House deleted");

    Ok(Json(DeleteHouseResponse { success: true }))
}
