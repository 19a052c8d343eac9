use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque user identifier issued by the external auth provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub id: Uuid,
    pub user_id: OwnerId,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What the quiz generator needs to know about a medication.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationBrief {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
}

impl From<&Medication> for MedicationBrief {
    fn from(medication: &Medication) -> Self {
        MedicationBrief {
            id: Some(medication.id.to_string()),
            name: medication.name.clone(),
            dosage: medication.dosage.clone(),
            frequency: medication.frequency.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationPayload {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MedicationPayload {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name is required");
        }
        if self.dosage.trim().is_empty() {
            return Err("dosage is required");
        }
        if self.frequency.trim().is_empty() {
            return Err("frequency is required");
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

impl TryFrom<&str> for Severity {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "mild" => Ok(Severity::Mild),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: OwnerId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub medication: Option<String>,
    pub symptoms: Vec<String>,
    pub severity: Option<Severity>,
    /// Minutes between the dose and the entry.
    pub time_after_dose: Option<i32>,
    pub confidence: Option<f32>,
    pub audio_url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalPayload {
    pub text: String,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub time_after_dose: Option<i32>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

impl JournalPayload {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.text.trim().is_empty() {
            return Err("text is required");
        }
        if matches!(self.time_after_dose, Some(minutes) if minutes < 0) {
            return Err("timeAfterDose must not be negative");
        }
        Ok(())
    }
}

/// Structured extraction attached to a journal entry before it is saved.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalAnalysis {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub time_after_dose: Option<i32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Name of the medication the question is about, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_id: Option<String>,
}

impl QuizQuestion {
    pub fn is_well_formed(&self) -> bool {
        !self.question_text.trim().is_empty()
            && self.options.len() == 4
            && self.correct_answer < self.options.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: OwnerId,
    pub questions: Vec<QuizQuestion>,
    pub answers: Vec<usize>,
    pub score: u32,
    pub total_questions: u32,
    pub timestamp: DateTime<Utc>,
}

/// An attempt that has not been persisted yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuizAttempt {
    pub questions: Vec<QuizQuestion>,
    pub answers: Vec<usize>,
    pub score: u32,
    pub total_questions: u32,
}

/// Fields read from a photo of a medication package.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScannedMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub notes: Option<String>,
}
