use super::{DocumentStore, StoreResult};
use crate::domain::models::{
    JournalEntry, JournalPayload, Medication, MedicationPayload, NewQuizAttempt, OwnerId,
    QuizAttempt, QuizQuestion, Severity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct MedicationRow {
    id: Uuid,
    user_id: String,
    name: String,
    dosage: String,
    frequency: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<MedicationRow> for Medication {
    fn from(row: MedicationRow) -> Self {
        Medication {
            id: row.id,
            user_id: OwnerId(row.user_id),
            name: row.name,
            dosage: row.dosage,
            frequency: row.frequency,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JournalRow {
    id: Uuid,
    user_id: String,
    text: String,
    medication: Option<String>,
    symptoms: Json<Vec<String>>,
    severity: Option<String>,
    time_after_dose: Option<i32>,
    confidence: Option<f32>,
    audio_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<JournalRow> for JournalEntry {
    fn from(row: JournalRow) -> Self {
        JournalEntry {
            id: row.id,
            user_id: OwnerId(row.user_id),
            text: row.text,
            timestamp: row.created_at,
            medication: row.medication,
            symptoms: row.symptoms.0,
            severity: row
                .severity
                .as_deref()
                .and_then(|s| Severity::try_from(s).ok()),
            time_after_dose: row.time_after_dose,
            confidence: row.confidence,
            audio_url: row.audio_url,
        }
    }
}

#[derive(Debug, FromRow)]
struct AttemptRow {
    id: Uuid,
    user_id: String,
    questions: Json<Vec<QuizQuestion>>,
    answers: Json<Vec<usize>>,
    score: i32,
    total_questions: i32,
    created_at: DateTime<Utc>,
}

impl From<AttemptRow> for QuizAttempt {
    fn from(row: AttemptRow) -> Self {
        QuizAttempt {
            id: row.id,
            user_id: OwnerId(row.user_id),
            questions: row.questions.0,
            answers: row.answers.0,
            score: row.score.max(0) as u32,
            total_questions: row.total_questions.max(0) as u32,
            timestamp: row.created_at,
        }
    }
}

const MEDICATION_COLUMNS: &str =
    "id, user_id, name, dosage, frequency, notes, created_at, updated_at";
const JOURNAL_COLUMNS: &str =
    "id, user_id, text, medication, symptoms, severity, time_after_dose, confidence, audio_url, created_at";
const ATTEMPT_COLUMNS: &str = "id, user_id, questions, answers, score, total_questions, created_at";

#[async_trait]
impl DocumentStore for PgStore {
    async fn list_medications(&self, owner: &OwnerId) -> StoreResult<Vec<Medication>> {
        let rows = sqlx::query_as::<_, MedicationRow>(&format!(
            "SELECT {MEDICATION_COLUMNS} FROM medications WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Medication::from).collect())
    }

    async fn insert_medication(
        &self,
        owner: &OwnerId,
        payload: &MedicationPayload,
    ) -> StoreResult<Medication> {
        let row = sqlx::query_as::<_, MedicationRow>(&format!(
            r#"
            INSERT INTO medications (id, user_id, name, dosage, frequency, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {MEDICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner.as_str())
        .bind(&payload.name)
        .bind(&payload.dosage)
        .bind(&payload.frequency)
        .bind(&payload.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_medication(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &MedicationPayload,
    ) -> StoreResult<Option<Medication>> {
        let row = sqlx::query_as::<_, MedicationRow>(&format!(
            r#"
            UPDATE medications
            SET name = $3, dosage = $4, frequency = $5, notes = $6, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEDICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner.as_str())
        .bind(&payload.name)
        .bind(&payload.dosage)
        .bind(&payload.frequency)
        .bind(&payload.notes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Medication::from))
    }

    async fn delete_medication(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM medications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_journal(&self, owner: &OwnerId) -> StoreResult<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalRow>(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(JournalEntry::from).collect())
    }

    async fn insert_journal(
        &self,
        owner: &OwnerId,
        payload: &JournalPayload,
    ) -> StoreResult<JournalEntry> {
        let row = sqlx::query_as::<_, JournalRow>(&format!(
            r#"
            INSERT INTO journal
                (id, user_id, text, medication, symptoms, severity, time_after_dose, confidence, audio_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            RETURNING {JOURNAL_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner.as_str())
        .bind(&payload.text)
        .bind(&payload.medication)
        .bind(Json(&payload.symptoms))
        .bind(payload.severity.map(|s| s.as_str()))
        .bind(payload.time_after_dose)
        .bind(payload.confidence)
        .bind(&payload.audio_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_journal(
        &self,
        owner: &OwnerId,
        id: Uuid,
        payload: &JournalPayload,
    ) -> StoreResult<Option<JournalEntry>> {
        let row = sqlx::query_as::<_, JournalRow>(&format!(
            r#"
            UPDATE journal
            SET text = $3, medication = $4, symptoms = $5, severity = $6,
                time_after_dose = $7, confidence = $8, audio_url = $9, created_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {JOURNAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner.as_str())
        .bind(&payload.text)
        .bind(&payload.medication)
        .bind(Json(&payload.symptoms))
        .bind(payload.severity.map(|s| s.as_str()))
        .bind(payload.time_after_dose)
        .bind(payload.confidence)
        .bind(&payload.audio_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JournalEntry::from))
    }

    async fn delete_journal(&self, owner: &OwnerId, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM journal WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_quiz_attempt(
        &self,
        owner: &OwnerId,
        attempt: &NewQuizAttempt,
    ) -> StoreResult<QuizAttempt> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            r#"
            INSERT INTO quiz_attempts (id, user_id, questions, answers, score, total_questions, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner.as_str())
        .bind(Json(&attempt.questions))
        .bind(Json(&attempt.answers))
        .bind(attempt.score as i32)
        .bind(attempt.total_questions as i32)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Quiz attempt recorded: id={}, user_id={}, score={}/{}",
            row.id,
            owner,
            attempt.score,
            attempt.total_questions
        );
        Ok(row.into())
    }

    async fn list_quiz_attempts(&self, owner: &OwnerId) -> StoreResult<Vec<QuizAttempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(QuizAttempt::from).collect())
    }
}
