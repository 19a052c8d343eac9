pub mod memory;
pub mod postgres;

use crate::domain::models::{
    JournalEntry, JournalPayload, Medication, MedicationPayload, NewQuizAttempt, OwnerId,
    QuizAttempt,
};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner-scoped persistence for the `medications`, `journal` and `quiz_attempts` collections.
///
/// Every query is filtered by owner; a document that belongs to someone else
/// behaves exactly like a missing one.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_medications(&self, owner: &OwnerId) -> StoreResult<Vec<Medication>>;

    async fn insert_medication(
        &self,
        owner: &OwnerId,
        payload: &MedicationPayload,
    ) -> StoreResult<Medication>;

    async fn update_medication(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &MedicationPayload,
    ) -> StoreResult<Option<Medication>>;

    async fn delete_medication(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool>;

    /// Newest first.
    async fn list_journal(&self, owner: &OwnerId) -> StoreResult<Vec<JournalEntry>>;

    async fn insert_journal(
        &self,
        owner: &OwnerId,
        payload: &JournalPayload,
    ) -> StoreResult<JournalEntry>;

    /// Replaces the entry's content and stamps it with the current time.
    async fn update_journal(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &JournalPayload,
    ) -> StoreResult<Option<JournalEntry>>;

    async fn delete_journal(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool>;

    async fn insert_quiz_attempt(
        &self,
        owner: &OwnerId,
        attempt: &NewQuizAttempt,
    ) -> StoreResult<QuizAttempt>;

    /// Complete history, newest first.
    async fn list_quiz_attempts(&self, owner: &OwnerId) -> StoreResult<Vec<QuizAttempt>>;
}
