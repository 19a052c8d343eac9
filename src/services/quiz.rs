use crate::domain::models::{MedicationBrief, QuizQuestion};
use crate::domain::quiz::{fallback_questions, shuffled_fallback_questions, QuestionOrigin};
use crate::services::ai::AiResult;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait QuizGenerator: Send + Sync {
    async fn generate_questions(
        &self,
        medications: &[MedicationBrief],
    ) -> AiResult<Vec<QuizQuestion>>;
}

#[derive(Debug, Clone)]
pub struct QuestionSet {
    pub questions: Vec<QuizQuestion>,
    pub origin: QuestionOrigin,
}

/// Picks AI questions when possible and the static set otherwise. Never fails.
#[derive(Clone)]
pub struct QuestionSource {
    generator: Arc<dyn QuizGenerator>,
}

impl QuestionSource {
    pub fn new(generator: Arc<dyn QuizGenerator>) -> Self {
        Self { generator }
    }

    /// `restart` reshuffles the static set when the owner has no medications.
    pub async fn fetch(&self, medications: &[MedicationBrief], restart: bool) -> QuestionSet {
        if medications.is_empty() {
            let questions = if restart {
                reshuffled_fallback()
            } else {
                fallback_questions()
            };
            return QuestionSet {
                questions,
                origin: QuestionOrigin::Fallback,
            };
        }

        match self.generator.generate_questions(medications).await {
            Ok(questions) => {
                tracing::debug!(
                    "Generated {} quiz questions for {} medications",
                    questions.len(),
                    medications.len()
                );
                QuestionSet {
                    questions,
                    origin: QuestionOrigin::Ai,
                }
            }
            Err(e) => {
                tracing::warn!("Quiz generation failed, using fallback questions: {}", e);
                QuestionSet {
                    questions: reshuffled_fallback(),
                    origin: QuestionOrigin::Fallback,
                }
            }
        }
    }
}

fn reshuffled_fallback() -> Vec<QuizQuestion> {
    shuffled_fallback_questions(&mut rand::thread_rng())
}
