use crate::analytics::knowledge::{build_report, KnowledgeReport};
use crate::domain::models::{
    MedicationBrief, NewQuizAttempt, OwnerId, QuizAttempt, QuizQuestion,
};
use crate::domain::quiz::{AnswerOutcome, QuestionOrigin, QuizSession};
use crate::services::quiz::QuestionSet;
use crate::state::SharedState;
use crate::web::error::{ApiError, ApiResult};
use crate::web::session::OwnerSession;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct GeneratePayload {
    #[serde(default)]
    pub medications: Vec<MedicationBrief>,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    pub questions: Vec<QuizQuestion>,
    pub source: QuestionOrigin,
}

#[derive(Deserialize)]
pub struct AnswerPayload {
    pub option: usize,
}

/// A question as shown to the quiz taker; the answer stays on the server.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub question_text: String,
    pub options: Vec<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub source: QuestionOrigin,
    pub question_index: usize,
    pub total_questions: usize,
    pub score: u32,
    pub completed: bool,
    pub question: Option<QuestionView>,
}

impl From<&QuizSession> for SessionView {
    fn from(session: &QuizSession) -> Self {
        SessionView {
            source: session.origin(),
            question_index: session.answers().len(),
            total_questions: session.questions().len(),
            score: session.score(),
            completed: session.is_completed(),
            question: session.current_question().map(|q| QuestionView {
                question_text: q.question_text.clone(),
                options: q.options.clone(),
            }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer: usize,
    pub explanation: Option<String>,
    pub session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<QuizAttempt>,
}

/// Proxy route; mounted without a session.
pub fn generate_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/quiz/generate", post(generate))
        .with_state(state)
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/session", get(current_session))
        .route("/session/start", post(start_session))
        .route("/session/answer", post(answer))
        .route("/session/restart", post(restart_session))
        .route("/attempts", get(attempts))
        .route("/report", get(report))
        .with_state(state)
}

async fn generate(
    State(state): State<SharedState>,
    Json(payload): Json<GeneratePayload>,
) -> ApiResult<Json<GenerateResponse>> {
    if payload.medications.is_empty() {
        return Err(ApiError::bad_request("Medications array is required"));
    }
    let set = state.questions.fetch(&payload.medications, false).await;
    Ok(Json(GenerateResponse {
        questions: set.questions,
        source: set.origin,
    }))
}

async fn load_questions(
    state: &SharedState,
    owner: &OwnerId,
    restart: bool,
) -> ApiResult<QuestionSet> {
    let medications: Vec<MedicationBrief> = state
        .store
        .list_medications(owner)
        .await?
        .iter()
        .map(MedicationBrief::from)
        .collect();
    Ok(state.questions.fetch(&medications, restart).await)
}

async fn current_session(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<SessionView>> {
    let sessions = state.quiz_sessions.read().await;
    sessions
        .get(&owner)
        .map(|s| Json(SessionView::from(s)))
        .ok_or(ApiError::NotFound)
}

async fn start_session(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<SessionView>> {
    let set = load_questions(&state, &owner, false).await?;
    let session = QuizSession::new(set.questions, set.origin)?;
    let view = SessionView::from(&session);
    state.quiz_sessions.write().await.insert(owner.clone(), session);
    tracing::info!(
        "Quiz session started for {} ({} questions, {:?})",
        owner,
        view.total_questions,
        view.source
    );
    Ok(Json(view))
}

async fn restart_session(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<SessionView>> {
    let set = load_questions(&state, &owner, true).await?;
    let mut sessions = state.quiz_sessions.write().await;
    let view = match sessions.get_mut(&owner) {
        Some(session) => {
            session.restart(set.questions, set.origin)?;
            SessionView::from(&*session)
        }
        None => {
            let session = QuizSession::new(set.questions, set.origin)?;
            let view = SessionView::from(&session);
            sessions.insert(owner, session);
            view
        }
    };
    Ok(Json(view))
}

async fn answer(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
    Json(payload): Json<AnswerPayload>,
) -> ApiResult<Json<AnswerResponse>> {
    let (outcome, answered, view) = {
        let mut sessions = state.quiz_sessions.write().await;
        let session = sessions.get_mut(&owner).ok_or(ApiError::NotFound)?;
        let answered = session.current_question().cloned();
        let outcome = session.answer(payload.option)?;
        (outcome, answered, SessionView::from(&*session))
    };
    // A successful answer always had a current question.
    let answered =
        answered.ok_or_else(|| ApiError::Internal("answered without a question".into()))?;

    let (correct, attempt) = match outcome {
        AnswerOutcome::Next { correct } => (correct, None),
        AnswerOutcome::Completed { correct, attempt } => {
            match state.store.insert_quiz_attempt(&owner, &attempt).await {
                Ok(recorded) => (correct, Some(recorded)),
                Err(e) => {
                    reopen_unrecorded(&state, &owner, &attempt).await;
                    return Err(e.into());
                }
            }
        }
    };

    Ok(Json(AnswerResponse {
        correct,
        correct_answer: answered.correct_answer,
        explanation: answered.explanation,
        session: view,
        attempt,
    }))
}

/// Puts the final question back so the owner can resubmit it once the store
/// recovers. A session restarted in the meantime is left alone.
async fn reopen_unrecorded(state: &SharedState, owner: &OwnerId, attempt: &NewQuizAttempt) {
    let mut sessions = state.quiz_sessions.write().await;
    let Some(session) = sessions.get_mut(owner) else {
        return;
    };
    if session.is_completed()
        && session.answers() == attempt.answers.as_slice()
        && session.questions() == attempt.questions.as_slice()
    {
        session.reopen_final_question();
        tracing::warn!("Quiz attempt for {} not recorded; final question reopened", owner);
    }
}

async fn attempts(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<Vec<QuizAttempt>>> {
    Ok(Json(state.store.list_quiz_attempts(&owner).await?))
}

async fn report(
    OwnerSession(owner): OwnerSession,
    State(state): State<SharedState>,
) -> ApiResult<Json<KnowledgeReport>> {
    let attempts = state.store.list_quiz_attempts(&owner).await?;
    Ok(Json(build_report(&attempts, Utc::now())?))
}
