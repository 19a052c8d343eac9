use crate::domain::models::ScannedMedication;
use crate::state::SharedState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::upload::{read_file_field, IMAGE_EXTENSIONS};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub medication: ScannedMedication,
    /// Raw model reply, shown to the user next to the parsed fields.
    pub medicine_info: String,
}

pub fn router(state: SharedState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/recognize-medicine", post(recognize_medicine))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn recognize_medicine(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> ApiResult<Json<ScanResponse>> {
    let upload = read_file_field(multipart, "image", "image").await?;
    let allowed = upload
        .extension()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !allowed {
        return Err(ApiError::bad_request("Only image files are allowed!"));
    }

    tracing::info!(
        "Received image file: name={}, type={}, size={}",
        upload.file_name,
        upload.content_type,
        upload.bytes.len()
    );

    let (medication, medicine_info) = state
        .ai
        .recognize_medication(&upload.bytes, &upload.content_type)
        .await?;
    Ok(Json(ScanResponse {
        medication,
        medicine_info,
    }))
}
