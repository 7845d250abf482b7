use crate::dtos::UploadResponse;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

/// Store the first file part of a multipart body and return its public URL.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
            .to_vec();

        let image = state
            .uploader
            .upload(data, &filename, &content_type)
            .await?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                key: image.key,
                url: image.url,
            }),
        ));
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}
