use crate::domain::models::{QuizAttempt, QuizQuestion};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNKNOWN_MEDICATION: &str = "your medication";
pub const MAX_SAMPLE_QUESTIONS: usize = 5;

static ABOUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)about (.*?)\?").expect("valid medication pattern"));
static FOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)for (.*?)\?").expect("valid medication pattern"));

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("no quiz attempts yet; complete at least one quiz to generate a report")]
    NoAttempts,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Topic {
    Dosage,
    Timing,
    #[serde(rename = "Missed Doses")]
    MissedDoses,
    #[serde(rename = "Side Effects")]
    SideEffects,
    Interactions,
    Storage,
    #[serde(rename = "General Knowledge")]
    GeneralKnowledge,
}

impl Topic {
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Dosage => "Dosage",
            Topic::Timing => "Timing",
            Topic::MissedDoses => "Missed Doses",
            Topic::SideEffects => "Side Effects",
            Topic::Interactions => "Interactions",
            Topic::Storage => "Storage",
            Topic::GeneralKnowledge => "General Knowledge",
        }
    }
}

// Checked in order; a question about "the time to take the dosage" is a dosage question.
const TOPIC_RULES: [(Topic, &[&str]); 6] = [
    (Topic::Dosage, &["dosage", "how much", "amount"]),
    (Topic::Timing, &["when", "time", "schedule"]),
    (Topic::MissedDoses, &["miss", "skip", "forget"]),
    (Topic::SideEffects, &["side effect", "adverse", "reaction"]),
    (Topic::Interactions, &["interact", "other medication", "food"]),
    (Topic::Storage, &["store", "keep", "refrigerate"]),
];

pub fn classify_topic(question_text: &str) -> Topic {
    let lowered = question_text.to_lowercase();
    TOPIC_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(topic, _)| *topic)
        .unwrap_or(Topic::GeneralKnowledge)
}

/// Medication a question is about: explicit association, then the question text.
pub fn medication_name(question: &QuizQuestion) -> String {
    if let Some(name) = question
        .medication
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
    {
        return name.to_string();
    }
    extract_medication_from_text(&question.question_text)
        .unwrap_or_else(|| UNKNOWN_MEDICATION.to_string())
}

pub fn extract_medication_from_text(text: &str) -> Option<String> {
    ABOUT_PATTERN
        .captures(text)
        .or_else(|| FOR_PATTERN.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum PriorityLevel {
    #[serde(rename = "High Priority")]
    High,
    #[serde(rename = "Medium Priority")]
    Medium,
    #[serde(rename = "Low Priority")]
    Low,
}

impl PriorityLevel {
    pub fn from_counts(missed: u32, total: u32) -> Self {
        let miss_rate = missed as f64 / total as f64 * 100.0;
        if miss_rate > 50.0 {
            PriorityLevel::High
        } else if miss_rate > 25.0 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct MedicationKnowledge {
    pub total: u32,
    pub missed: u32,
    pub topics: BTreeMap<Topic, u32>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct EducationArea {
    pub medication: String,
    pub level: PriorityLevel,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MissedQuestion {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub medication_name: String,
    pub topic: Topic,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeReport {
    pub generated_at: DateTime<Utc>,
    pub attempt_count: usize,
    pub overall_score: u32,
    pub medication_knowledge: BTreeMap<String, MedicationKnowledge>,
    pub areas_for_education: Vec<EducationArea>,
    pub specific_questions: Vec<MissedQuestion>,
    pub recommendations: Vec<Recommendation>,
}

pub fn overall_score(attempts: &[QuizAttempt]) -> u32 {
    let score: u64 = attempts.iter().map(|a| a.score as u64).sum();
    let total: u64 = attempts.iter().map(|a| a.total_questions as u64).sum();
    if total == 0 {
        return 0;
    }
    (score as f64 / total as f64 * 100.0).round() as u32
}

pub fn build_report(
    attempts: &[QuizAttempt],
    generated_at: DateTime<Utc>,
) -> Result<KnowledgeReport, ReportError> {
    if attempts.is_empty() {
        return Err(ReportError::NoAttempts);
    }

    let mut asked: BTreeMap<String, u32> = BTreeMap::new();
    let mut knowledge: BTreeMap<String, MedicationKnowledge> = BTreeMap::new();
    let mut missed_questions: Vec<MissedQuestion> = Vec::new();

    for attempt in attempts {
        for (index, question) in attempt.questions.iter().enumerate() {
            let medication = medication_name(question);
            *asked.entry(medication.clone()).or_insert(0) += 1;

            let answered_correctly = attempt.answers.get(index) == Some(&question.correct_answer);
            if answered_correctly {
                continue;
            }

            let topic = classify_topic(&question.question_text);
            let entry = knowledge.entry(medication.clone()).or_default();
            entry.missed += 1;
            *entry.topics.entry(topic).or_insert(0) += 1;

            if !missed_questions
                .iter()
                .any(|m| m.question.question_text == question.question_text)
            {
                missed_questions.push(MissedQuestion {
                    question: question.clone(),
                    medication_name: medication,
                    topic,
                });
            }
        }
    }

    for (medication, entry) in knowledge.iter_mut() {
        entry.total = asked.get(medication).copied().unwrap_or(entry.missed);
    }
    missed_questions.truncate(MAX_SAMPLE_QUESTIONS);

    Ok(KnowledgeReport {
        generated_at,
        attempt_count: attempts.len(),
        overall_score: overall_score(attempts),
        areas_for_education: education_areas(&knowledge),
        recommendations: recommendations(&knowledge),
        medication_knowledge: knowledge,
        specific_questions: missed_questions,
    })
}

fn education_areas(knowledge: &BTreeMap<String, MedicationKnowledge>) -> Vec<EducationArea> {
    knowledge
        .iter()
        .filter(|(_, data)| data.total > 0)
        .map(|(medication, data)| {
            let level = PriorityLevel::from_counts(data.missed, data.total);
            let description = match level {
                PriorityLevel::High => format!(
                    "Significant knowledge gaps about {medication}. Consider scheduling a detailed consultation."
                ),
                PriorityLevel::Medium => format!(
                    "Some knowledge gaps about {medication}. Review medication information and ask questions at next appointment."
                ),
                PriorityLevel::Low => format!(
                    "Good understanding of {medication}, but some areas could be reviewed."
                ),
            };
            EducationArea {
                medication: medication.clone(),
                level,
                description,
            }
        })
        .collect()
}

fn recommendations(knowledge: &BTreeMap<String, MedicationKnowledge>) -> Vec<Recommendation> {
    let mut recs = vec![Recommendation {
        title: "Schedule a Medication Review".to_string(),
        description:
            "Schedule an appointment with your healthcare provider to review all your medications."
                .to_string(),
    }];

    for (medication, data) in knowledge.iter().filter(|(_, data)| data.total > 0) {
        if PriorityLevel::from_counts(data.missed, data.total) == PriorityLevel::High {
            recs.push(Recommendation {
                title: format!("Detailed Education on {medication}"),
                description: format!(
                    "Request a detailed explanation about {medication}, including proper usage, side effects, and interactions."
                ),
            });
        }

        for (topic, count) in &data.topics {
            if *count == 0 {
                continue;
            }
            recs.push(Recommendation {
                title: format!("Review {} for {medication}", topic.label()),
                description: format!(
                    "Focus on understanding {} aspects of {medication}.",
                    topic.label().to_lowercase()
                ),
            });
        }
    }

    recs
}
