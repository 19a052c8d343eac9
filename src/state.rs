use crate::db::DocumentStore;
use crate::domain::models::OwnerId;
use crate::domain::quiz::QuizSession;
use crate::services::ai::AiService;
use crate::services::audio::AudioStore;
use crate::services::quiz::QuestionSource;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub ai: Arc<AiService>,
    pub questions: QuestionSource,
    pub audio: AudioStore,
    pub session_key: Vec<u8>,
    pub max_upload_bytes: usize,
    pub quiz_sessions: Arc<RwLock<HashMap<OwnerId, QuizSession>>>, // owner -> active quiz
}

pub type SharedState = Arc<AppState>;
