pub mod error;
pub mod journal;
pub mod medications;
pub mod quiz;
pub mod scanner;
pub mod session;
pub mod upload;
pub mod voice;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(voice::router(state.clone()))
        .merge(scanner::router(state.clone()))
        .merge(quiz::generate_router(state.clone()))
        .nest("/medications", medications::router(state.clone()))
        .nest("/journal", journal::router(state.clone()))
        .nest("/quiz", quiz::router(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;
    use crate::db::{DocumentStore, MemoryStore, StoreError, StoreResult};
    use crate::domain::models::{
        JournalEntry, JournalPayload, Medication, MedicationPayload, NewQuizAttempt, OwnerId,
        QuizAttempt,
    };
    use crate::services::ai::AiService;
    use crate::services::audio::AudioStore;
    use crate::services::quiz::tests::StubGenerator;
    use crate::services::quiz::QuestionSource;
    use crate::state::AppState;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;
    use uuid::Uuid;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn test_state() -> SharedState {
        test_state_with(Arc::new(MemoryStore::new()))
    }

    fn test_state_with(store: Arc<dyn DocumentStore>) -> SharedState {
        Arc::new(AppState {
            store,
            ai: Arc::new(AiService::new(AiConfig {
                api_key: "test-key".into(),
                api_base: "http://127.0.0.1:9".into(),
                chat_model: "gpt-3.5-turbo".into(),
                vision_model: "gpt-4o".into(),
                tts_voice: "alloy".into(),
            })),
            questions: QuestionSource::new(Arc::new(StubGenerator { reply: None })),
            audio: AudioStore::new(std::env::temp_dir().join("medminder-router-tests")),
            session_key: KEY.to_vec(),
            max_upload_bytes: 1024 * 1024,
            quiz_sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Memory store whose next attempt insert fails when `fail_next_attempt` is set.
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_attempt: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn list_medications(&self, owner: &OwnerId) -> StoreResult<Vec<Medication>> {
            self.inner.list_medications(owner).await
        }

        async fn insert_medication(
            &self,
            owner: &OwnerId,
            payload: &MedicationPayload,
        ) -> StoreResult<Medication> {
            self.inner.insert_medication(owner, payload).await
        }

        async fn update_medication(
            &self,
            owner: &OwnerId,
            id: Uuid,
            payload: &MedicationPayload,
        ) -> StoreResult<Option<Medication>> {
            self.inner.update_medication(owner, id, payload).await
        }

        async fn delete_medication(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_medication(owner, id).await
        }

        async fn list_journal(&self, owner: &OwnerId) -> StoreResult<Vec<JournalEntry>> {
            self.inner.list_journal(owner).await
        }

        async fn insert_journal(
            &self,
            owner: &OwnerId,
            payload: &JournalPayload,
        ) -> StoreResult<JournalEntry> {
            self.inner.insert_journal(owner, payload).await
        }

        async fn update_journal(
            &self,
            owner: &OwnerId,
            id: Uuid,
            payload: &JournalPayload,
        ) -> StoreResult<Option<JournalEntry>> {
            self.inner.update_journal(owner, id, payload).await
        }

        async fn delete_journal(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_journal(owner, id).await
        }

        async fn insert_quiz_attempt(
            &self,
            owner: &OwnerId,
            attempt: &NewQuizAttempt,
        ) -> StoreResult<QuizAttempt> {
            if self.fail_next_attempt.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.insert_quiz_attempt(owner, attempt).await
        }

        async fn list_quiz_attempts(&self, owner: &OwnerId) -> StoreResult<Vec<QuizAttempt>> {
            self.inner.list_quiz_attempts(owner).await
        }
    }

    fn token(owner: &str) -> String {
        session::sign_session(&OwnerId(owner.into()), Duration::hours(1), KEY).unwrap()
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        owner: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(owner)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(app, request).await
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = routes(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn owner_routes_require_a_session() {
        let app = routes(test_state());
        for uri in ["/medications", "/journal", "/quiz/attempts", "/quiz/report"] {
            let (status, body) = call(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"], "unauthorized");
        }

        let request = Request::builder()
            .uri("/medications")
            .header(header::AUTHORIZATION, "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn medication_crud_is_owner_scoped() {
        let app = routes(test_state());
        let (status, created) = call(
            &app,
            Method::POST,
            "/medications",
            Some("alice"),
            Some(json!({"name": "Lisinopril", "dosage": "10 mg", "frequency": "Once daily"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/medications",
            Some("alice"),
            Some(json!({"name": " ", "dosage": "10 mg", "frequency": "Once daily"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, bobs) = call(&app, Method::GET, "/medications", Some("bob"), None).await;
        assert_eq!(bobs, json!([]));

        let uri = format!("/medications/{id}");
        let (status, _) = call(
            &app,
            Method::PUT,
            &uri,
            Some("bob"),
            Some(json!({"name": "Hijack", "dosage": "1", "frequency": "1"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&app, Method::DELETE, &uri, Some("bob"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = call(
            &app,
            Method::PUT,
            &uri,
            Some("alice"),
            Some(json!({"name": "Lisinopril", "dosage": "20 mg", "frequency": "Once daily"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["dosage"], "20 mg");

        let (status, _) = call(&app, Method::DELETE, &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, remaining) = call(&app, Method::GET, "/medications", Some("alice"), None).await;
        assert_eq!(remaining, json!([]));
    }

    #[tokio::test]
    async fn journal_insights_follow_entries() {
        let app = routes(test_state());
        let (_, insight) = call(&app, Method::GET, "/journal/insights", Some("alice"), None).await;
        assert!(insight["pattern"]
            .as_str()
            .unwrap()
            .starts_with("Keep adding entries"));

        for _ in 0..2 {
            let (status, _) = call(
                &app,
                Method::POST,
                "/journal",
                Some("alice"),
                Some(json!({
                    "text": "Felt dizzy after my morning pill",
                    "medication": "Lisinopril",
                    "symptoms": ["dizziness"],
                    "severity": "mild",
                    "timeAfterDose": 45
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, insight) = call(&app, Method::GET, "/journal/insights", Some("alice"), None).await;
        assert_eq!(
            insight["pattern"],
            "You've reported dizziness 2 times after taking Lisinopril."
        );

        let (status, _) = call(
            &app,
            Method::POST,
            "/journal",
            Some("alice"),
            Some(json!({"text": "x", "timeAfterDose": -3})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn report_without_attempts_is_a_conflict() {
        let app = routes(test_state());
        let (status, body) = call(&app, Method::GET, "/quiz/report", Some("alice"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().starts_with("no quiz attempts yet"));
    }

    #[tokio::test]
    async fn full_quiz_session_records_one_attempt() {
        let app = routes(test_state());

        let (status, _) = call(&app, Method::GET, "/quiz/session", Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, view) =
            call(&app, Method::POST, "/quiz/session/start", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["source"], "fallback");
        assert_eq!(view["totalQuestions"], 3);
        assert!(view["question"].get("correctAnswer").is_none());

        let (status, _) = call(
            &app,
            Method::POST,
            "/quiz/session/answer",
            Some("alice"),
            Some(json!({"option": 9})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Fallback answers are 0, 2, 0 on first load; the last submission is wrong.
        let mut last = Value::Null;
        for option in [0, 2, 1] {
            let (status, body) = call(
                &app,
                Method::POST,
                "/quiz/session/answer",
                Some("alice"),
                Some(json!({ "option": option })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            last = body;
        }
        assert_eq!(last["correct"], false);
        assert_eq!(last["session"]["completed"], true);
        assert_eq!(last["attempt"]["score"], 2);
        assert_eq!(last["attempt"]["totalQuestions"], 3);

        let (status, _) = call(
            &app,
            Method::POST,
            "/quiz/session/answer",
            Some("alice"),
            Some(json!({"option": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, attempts) = call(&app, Method::GET, "/quiz/attempts", Some("alice"), None).await;
        assert_eq!(attempts.as_array().unwrap().len(), 1);
        let (_, others) = call(&app, Method::GET, "/quiz/attempts", Some("bob"), None).await;
        assert_eq!(others, json!([]));

        let (status, report) = call(&app, Method::GET, "/quiz/report", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["overallScore"], 67);
        assert_eq!(report["attemptCount"], 1);

        let (status, view) =
            call(&app, Method::POST, "/quiz/session/restart", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["questionIndex"], 0);
        assert_eq!(view["score"], 0);
        assert_eq!(view["completed"], false);
    }

    #[tokio::test]
    async fn generate_rejects_empty_list_and_falls_back_on_failure() {
        let app = routes(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/quiz/generate",
            None,
            Some(json!({"medications": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Medications array is required");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/quiz/generate",
            None,
            Some(json!({
                "medications": [
                    {"name": "Metformin", "dosage": "500 mg", "frequency": "Twice daily"}
                ]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "fallback");
        assert_eq!(body["questions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_attempt_save_reopens_the_final_question() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_next_attempt: AtomicBool::new(true),
        });
        let app = routes(test_state_with(store));
        let answer = |option: usize| {
            let app = app.clone();
            async move {
                call(
                    &app,
                    Method::POST,
                    "/quiz/session/answer",
                    Some("alice"),
                    Some(json!({ "option": option })),
                )
                .await
            }
        };

        let (status, _) =
            call(&app, Method::POST, "/quiz/session/start", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        for option in [0, 2] {
            assert_eq!(answer(option).await.0, StatusCode::OK);
        }

        let (status, body) = answer(0).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");

        let (_, view) = call(&app, Method::GET, "/quiz/session", Some("alice"), None).await;
        assert_eq!(view["completed"], false);
        assert_eq!(view["questionIndex"], 2);
        assert_eq!(view["score"], 2);

        let (status, body) = answer(0).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["completed"], true);
        assert_eq!(body["attempt"]["score"], 3);

        let (_, attempts) = call(&app, Method::GET, "/quiz/attempts", Some("alice"), None).await;
        assert_eq!(attempts.as_array().unwrap().len(), 1);
        let (status, _) = call(&app, Method::GET, "/quiz/report", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    const BOUNDARY: &str = "medminder-boundary";

    fn multipart_request(uri: &str, field: &str, file_name: &str, bytes: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {bytes}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn scanner_rejects_non_image_uploads() {
        let app = routes(test_state());
        let request = multipart_request("/recognize-medicine", "image", "notes.txt", "hello");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only image files are allowed!");

        let request = multipart_request("/recognize-medicine", "photo", "label.png", "png");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No image file provided");
    }

    #[tokio::test]
    async fn process_voice_dispatches_on_content_type() {
        let app = routes(test_state());
        let (status, body) = call(
            &app,
            Method::POST,
            "/process-voice",
            None,
            Some(json!({"text": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Text is required");

        let request = multipart_request("/process-voice", "note", "memo.webm", "abc");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No audio file provided");
    }

    #[tokio::test]
    async fn narration_routes_require_text() {
        let app = routes(test_state());
        for uri in ["/process-medication", "/speak-medication"] {
            let (status, body) =
                call(&app, Method::POST, uri, None, Some(json!({"text": ""}))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"], "No text provided");
        }
    }
}
