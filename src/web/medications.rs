use crate::domain::models::{Medication, MedicationPayload};
use crate::state::SharedState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::session::OwnerSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_medications).post(create_medication))
        .route("/:id", put(update_medication).delete(delete_medication))
        .with_state(state)
}

async fn list_medications(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<Medication>>> {
    Ok(Json(state.store.list_medications(&owner).await?))
}

async fn create_medication(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Json(payload): Json<MedicationPayload>,
) -> ApiResult<(StatusCode, Json<Medication>)> {
    payload.validate().map_err(ApiError::bad_request)?;
    let medication = state.store.insert_medication(&owner, &payload).await?;
    tracing::info!("Medication {} added for {}", medication.id, owner);
    Ok((StatusCode::CREATED, Json(medication)))
}

async fn update_medication(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MedicationPayload>,
) -> ApiResult<Json<Medication>> {
    payload.validate().map_err(ApiError::bad_request)?;
    state
        .store
        .update_medication(&owner, id, &payload)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_medication(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.delete_medication(&owner, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
