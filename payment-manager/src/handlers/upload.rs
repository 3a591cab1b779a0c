use crate::dtos::MessageResponse;
use crate::startup::AppState;
use axum::{
    extract::{multipart::Field, Multipart, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

pub async fn upload_payments(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = read_limited(field, state.config.max_request_bytes)
            .await?
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Uploaded file is too large")))?;

        let inserted = state.ingest.ingest(&filename, &data).await?;

        return Ok(Json(MessageResponse::new(format!(
            "{} payments inserted successfully.",
            inserted
        ))));
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}

/// Reads a multipart field chunk by chunk. Returns `None` as soon as more
/// than `max_bytes` have arrived, without draining the rest.
async fn read_limited(
    mut field: Field<'_>,
    max_bytes: usize,
) -> Result<Option<Vec<u8>>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
    {
        if data.len() + chunk.len() > max_bytes {
            return Ok(None);
        }
        data.extend_from_slice(&chunk);
    }
    Ok(Some(data))
}
