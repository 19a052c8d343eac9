use crate::domain::models::JournalAnalysis;
use crate::services::ai::DEFAULT_NURSE_NAME;
use crate::state::SharedState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::upload::read_file_field;
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NursePayload {
    pub text: String,
    #[serde(default)]
    pub nurse_name: Option<String>,
    #[serde(default)]
    pub personalized: Option<bool>,
}

#[derive(Deserialize)]
pub struct TextPayload {
    pub text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpokenReply {
    pub text: String,
    pub audio_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseReply {
    pub response: String,
    pub audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<JournalAnalysis>,
}

#[derive(Serialize)]
pub struct Transcript {
    pub text: String,
}

pub fn router(state: SharedState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/process-voice", post(process_voice))
        .route("/transcribe", post(transcribe))
        .route("/process-medication", post(process_medication))
        .route("/speak-medication", post(speak_medication))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

/// Audio upload gets a spoken answer; a JSON journal entry gets the AI nurse.
async fn process_voice(State(state): State<SharedState>, request: Request) -> ApiResult<Response> {
    if is_json(&request) {
        let Json(payload) = Json::<NursePayload>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return Ok(nurse(&state, payload).await?.into_response());
    }

    let multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    let upload = read_file_field(multipart, "audio", "audio.webm").await?;
    tracing::info!(
        "Received audio file: name={}, type={}, size={}",
        upload.file_name,
        upload.content_type,
        upload.bytes.len()
    );

    let transcript = state
        .ai
        .transcribe(upload.bytes, &upload.file_name, &upload.content_type)
        .await?;
    let answer = state.ai.answer_question(&transcript).await?;
    let reply = speak(&state, "response", answer).await?;
    Ok(Json(reply).into_response())
}

async fn nurse(state: &SharedState, payload: NursePayload) -> ApiResult<Json<NurseReply>> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text is required"));
    }

    let response = if payload.personalized.unwrap_or(true) {
        let nurse_name = payload
            .nurse_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_NURSE_NAME);
        state.ai.nurse_reply(&payload.text, nurse_name).await?
    } else {
        state.ai.answer_question(&payload.text).await?
    };

    let audio = state.ai.speak(&response).await?;
    let audio_url = state.audio.save_mp3("nurse-response", &audio).await?;

    let analysis = match state.ai.analyze_journal(&payload.text).await {
        Ok(analysis) => Some(analysis),
        Err(e) => {
            tracing::warn!("Journal analysis omitted from nurse reply: {}", e);
            None
        }
    };

    Ok(Json(NurseReply {
        response,
        audio_url,
        analysis,
    }))
}

async fn transcribe(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> ApiResult<Json<Transcript>> {
    let upload = read_file_field(multipart, "audio", "audio.webm").await?;
    let text = state
        .ai
        .transcribe(upload.bytes, &upload.file_name, &upload.content_type)
        .await?;
    Ok(Json(Transcript { text }))
}

async fn process_medication(
    State(state): State<SharedState>,
    Json(payload): Json<TextPayload>,
) -> ApiResult<Json<SpokenReply>> {
    narrate(&state, "response", &payload.text).await.map(Json)
}

async fn speak_medication(
    State(state): State<SharedState>,
    Json(payload): Json<TextPayload>,
) -> ApiResult<Json<SpokenReply>> {
    narrate(&state, "medication", &payload.text).await.map(Json)
}

async fn narrate(state: &SharedState, prefix: &str, text: &str) -> ApiResult<SpokenReply> {
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("No text provided"));
    }
    let enhanced = state.ai.narrate_medication(text).await?;
    speak(state, prefix, enhanced).await
}

async fn speak(state: &SharedState, prefix: &str, text: String) -> ApiResult<SpokenReply> {
    let audio = state.ai.speak(&text).await?;
    let audio_url = state.audio.save_mp3(prefix, &audio).await?;
    Ok(SpokenReply { text, audio_url })
}
