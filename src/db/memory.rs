use super::{DocumentStore, StoreResult};
use crate::domain::models::{
    JournalEntry, JournalPayload, Medication, MedicationPayload, NewQuizAttempt, OwnerId,
    QuizAttempt,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store used when no database is configured.
#[derive(Clone, Default)]
pub struct MemoryStore {
    medications: Arc<RwLock<Vec<Medication>>>,
    journal: Arc<RwLock<Vec<JournalEntry>>>,
    quiz_attempts: Arc<RwLock<Vec<QuizAttempt>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn journal_entry(id: Uuid, owner: &OwnerId, payload: &JournalPayload) -> JournalEntry {
    JournalEntry {
        id,
        user_id: owner.clone(),
        text: payload.text.clone(),
        timestamp: Utc::now(),
        medication: payload.medication.clone(),
        symptoms: payload.symptoms.clone(),
        severity: payload.severity,
        time_after_dose: payload.time_after_dose,
        confidence: payload.confidence,
        audio_url: payload.audio_url.clone(),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_medications(&self, owner: &OwnerId) -> StoreResult<Vec<Medication>> {
        let medications = self.medications.read().await;
        Ok(medications
            .iter()
            .filter(|m| &m.user_id == owner)
            .cloned()
            .collect())
    }

    async fn insert_medication(
        &self,
        owner: &OwnerId,
        payload: &MedicationPayload,
    ) -> StoreResult<Medication> {
        let medication = Medication {
            id: Uuid::new_v4(),
            user_id: owner.clone(),
            name: payload.name.clone(),
            dosage: payload.dosage.clone(),
            frequency: payload.frequency.clone(),
            notes: payload.notes.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.medications.write().await.push(medication.clone());
        Ok(medication)
    }

    async fn update_medication(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &MedicationPayload,
    ) -> StoreResult<Option<Medication>> {
        let mut medications = self.medications.write().await;
        let Some(existing) = medications
            .iter_mut()
            .find(|m| m.id == id && &m.user_id == owner)
        else {
            return Ok(None);
        };
        existing.name = payload.name.clone();
        existing.dosage = payload.dosage.clone();
        existing.frequency = payload.frequency.clone();
        existing.notes = payload.notes.clone();
        existing.updated_at = Some(Utc::now());
        Ok(Some(existing.clone()))
    }

    async fn delete_medication(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
        let mut medications = self.medications.write().await;
        let before = medications.len();
        medications.retain(|m| !(m.id == id && &m.user_id == owner));
        Ok(medications.len() < before)
    }

    async fn list_journal(&self, owner: &OwnerId) -> StoreResult<Vec<JournalEntry>> {
        let journal = self.journal.read().await;
        let mut entries: Vec<JournalEntry> = journal
            .iter()
            .filter(|e| &e.user_id == owner)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn insert_journal(
        &self,
        owner: &OwnerId,
        payload: &JournalPayload,
    ) -> StoreResult<JournalEntry> {
        let entry = journal_entry(Uuid::new_v4(), owner, payload);
        self.journal.write().await.push(entry.clone());
        Ok(entry)
    }

    async fn update_journal(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &JournalPayload,
    ) -> StoreResult<Option<JournalEntry>> {
        let mut journal = self.journal.write().await;
        let Some(existing) = journal
            .iter_mut()
            .find(|e| e.id == id && &e.user_id == owner)
        else {
            return Ok(None);
        };
        *existing = journal_entry(id, owner, payload);
        Ok(Some(existing.clone()))
    }

    async fn delete_journal(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
        let mut journal = self.journal.write().await;
        let before = journal.len();
        journal.retain(|e| !(e.id == id && &e.user_id == owner));
        Ok(journal.len() < before)
    }

    async fn insert_quiz_attempt(
        &self,
        owner: &OwnerId,
        attempt: &NewQuizAttempt,
    ) -> StoreResult<QuizAttempt> {
        let recorded = QuizAttempt {
            id: Uuid::new_v4(),
            user_id: owner.clone(),
            questions: attempt.questions.clone(),
            answers: attempt.answers.clone(),
            score: attempt.score,
            total_questions: attempt.total_questions,
            timestamp: Utc::now(),
        };
        self.quiz_attempts.write().await.push(recorded.clone());
        tracing::info!(
            "Quiz attempt recorded: id={}, user_id={}, score={}/{}",
            recorded.id,
            owner,
            recorded.score,
            recorded.total_questions
        );
        Ok(recorded)
    }

    async fn list_quiz_attempts(&self, owner: &OwnerId) -> StoreResult<Vec<QuizAttempt>> {
        let attempts = self.quiz_attempts.read().await;
        // Insertion order is chronological, so reversing yields newest first.
        Ok(attempts
            .iter()
            .rev()
            .filter(|a| &a.user_id == owner)
            .cloned()
            .collect())
    }
}
