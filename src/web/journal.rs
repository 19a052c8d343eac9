use crate::analytics::journal_patterns::{detect_pattern, JournalInsight};
use crate::domain::models::{JournalAnalysis, JournalEntry, JournalPayload};
use crate::state::SharedState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::session::OwnerSession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Default)]
pub struct CreateQuery {
    /// Fill in missing symptoms/medication/severity from the entry text.
    #[serde(default)]
    pub analyze: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/insights", get(insights))
        .route("/:id", put(update_entry).delete(delete_entry))
        .with_state(state)
}

async fn list_entries(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<JournalEntry>>> {
    Ok(Json(state.store.list_journal(&owner).await?))
}

async fn create_entry(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Query(query): Query<CreateQuery>,
    Json(mut payload): Json<JournalPayload>,
) -> ApiResult<(StatusCode, Json<JournalEntry>)> {
    payload.validate().map_err(ApiError::bad_request)?;

    if query.analyze {
        match state.ai.analyze_journal(&payload.text).await {
            Ok(analysis) => attach_analysis(&mut payload, analysis),
            Err(e) => tracing::warn!("Journal analysis skipped: {}", e),
        }
    }

    let entry = state.store.insert_journal(&owner, &payload).await?;
    tracing::info!("Journal entry {} added for {}", entry.id, owner);
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Only fills fields the user left empty.
fn attach_analysis(payload: &mut JournalPayload, analysis: JournalAnalysis) {
    if payload.symptoms.is_empty() {
        payload.symptoms = analysis.symptoms;
    }
    if payload.medication.is_none() {
        payload.medication = analysis.medication;
    }
    if payload.severity.is_none() {
        payload.severity = analysis.severity;
    }
    if payload.time_after_dose.is_none() {
        payload.time_after_dose = analysis.time_after_dose;
    }
    if payload.confidence.is_none() {
        payload.confidence = analysis.confidence;
    }
}

async fn update_entry(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JournalPayload>,
) -> ApiResult<Json<JournalEntry>> {
    payload.validate().map_err(ApiError::bad_request)?;
    state
        .store
        .update_journal(&owner, id, &payload)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_entry(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.store.delete_journal(&owner, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn insights(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<JournalInsight>> {
    let entries = state.store.list_journal(&owner).await?;
    Ok(Json(detect_pattern(&entries)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Severity;

    #[test]
    fn analysis_never_overrides_user_input() {
        let mut payload = JournalPayload {
            text: "Dizzy an hour after my pill".into(),
            medication: Some("Lisinopril".into()),
            symptoms: vec![],
            severity: None,
            time_after_dose: None,
            confidence: None,
            audio_url: None,
        };
        attach_analysis(
            &mut payload,
            JournalAnalysis {
                symptoms: vec!["dizziness".into()],
                medication: Some("Aspirin".into()),
                severity: Some(Severity::Mild),
                time_after_dose: Some(60),
                confidence: Some(0.8),
            },
        );
        assert_eq!(payload.medication.as_deref(), Some("Lisinopril"));
        assert_eq!(payload.symptoms, vec!["dizziness".to_string()]);
        assert_eq!(payload.severity, Some(Severity::Mild));
        assert_eq!(payload.time_after_dose, Some(60));
    }
}
