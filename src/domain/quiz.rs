use crate::domain::models::{NewQuizAttempt, QuizQuestion};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("quiz has no questions")]
    EmptyQuestionSet,
    #[error("quiz is already completed")]
    AlreadyCompleted,
    #[error("option {option} is out of range for a question with {options} options")]
    OptionOutOfRange { option: usize, options: usize },
}

const FALLBACK_SET: [(&str, [&str; 4], usize); 3] = [
    (
        "What is the correct dosage of your medication?",
        ["1 tablet", "2 tablets", "3 tablets", "4 tablets"],
        0,
    ),
    (
        "When should you take your medication?",
        ["Before meals", "After meals", "With meals", "Before bed"],
        2,
    ),
    (
        "What should you do if you miss a dose?",
        [
            "Take it immediately",
            "Skip it and take the next dose",
            "Double the next dose",
            "Call your doctor",
        ],
        0,
    ),
];

/// Static questions in canonical option order.
pub fn fallback_questions() -> Vec<QuizQuestion> {
    FALLBACK_SET
        .iter()
        .map(|(text, options, correct)| QuizQuestion {
            question_text: text.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct_answer: *correct,
            explanation: None,
            medication: None,
            medication_id: None,
        })
        .collect()
}

/// Static questions with every question's options independently shuffled.
pub fn shuffled_fallback_questions<R: Rng + ?Sized>(rng: &mut R) -> Vec<QuizQuestion> {
    fallback_questions()
        .into_iter()
        .map(|q| shuffle_options(q, rng))
        .collect()
}

/// Uniformly permutes the options and moves `correct_answer` along with its option.
pub fn shuffle_options<R: Rng + ?Sized>(question: QuizQuestion, rng: &mut R) -> QuizQuestion {
    let mut order: Vec<usize> = (0..question.options.len()).collect();
    order.shuffle(rng);

    let options = order.iter().map(|&i| question.options[i].clone()).collect();
    let correct_answer = order
        .iter()
        .position(|&i| i == question.correct_answer)
        .unwrap_or(question.correct_answer);

    QuizQuestion {
        options,
        correct_answer,
        ..question
    }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestionOrigin {
    Ai,
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    InProgress {
        index: usize,
        score: u32,
        answers: Vec<usize>,
    },
    Completed {
        score: u32,
        answers: Vec<usize>,
    },
}

#[derive(Debug, PartialEq)]
pub enum AnswerOutcome {
    Next { correct: bool },
    /// Emitted exactly once, on the answer that finishes the quiz.
    Completed {
        correct: bool,
        attempt: NewQuizAttempt,
    },
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    origin: QuestionOrigin,
    state: SessionState,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>, origin: QuestionOrigin) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::EmptyQuestionSet);
        }
        Ok(Self {
            questions,
            origin,
            state: SessionState::InProgress {
                index: 0,
                score: 0,
                answers: Vec::new(),
            },
        })
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn origin(&self) -> QuestionOrigin {
        self.origin
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, SessionState::Completed { .. })
    }

    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match &self.state {
            SessionState::InProgress { index, .. } => self.questions.get(*index),
            SessionState::Completed { .. } => None,
        }
    }

    pub fn score(&self) -> u32 {
        match &self.state {
            SessionState::InProgress { score, .. } | SessionState::Completed { score, .. } => {
                *score
            }
        }
    }

    pub fn answers(&self) -> &[usize] {
        match &self.state {
            SessionState::InProgress { answers, .. } | SessionState::Completed { answers, .. } => {
                answers
            }
        }
    }

    pub fn answer(&mut self, option: usize) -> Result<AnswerOutcome, QuizError> {
        let SessionState::InProgress {
            index,
            score,
            answers,
        } = &mut self.state
        else {
            return Err(QuizError::AlreadyCompleted);
        };

        let question = &self.questions[*index];
        if option >= question.options.len() {
            return Err(QuizError::OptionOutOfRange {
                option,
                options: question.options.len(),
            });
        }

        let correct = option == question.correct_answer;
        answers.push(option);
        if correct {
            *score += 1;
        }
        *index += 1;

        if *index < self.questions.len() {
            return Ok(AnswerOutcome::Next { correct });
        }

        let final_score = *score;
        let all_answers = std::mem::take(answers);
        self.state = SessionState::Completed {
            score: final_score,
            answers: all_answers.clone(),
        };

        Ok(AnswerOutcome::Completed {
            correct,
            attempt: NewQuizAttempt {
                questions: self.questions.clone(),
                answers: all_answers,
                score: final_score,
                total_questions: self.questions.len() as u32,
            },
        })
    }

    /// Takes back the answer that completed the session, leaving the final
    /// question open again. Used when the attempt could not be recorded.
    pub fn reopen_final_question(&mut self) -> bool {
        let SessionState::Completed { score, answers } = &mut self.state else {
            return false;
        };
        let (Some(last), Some(question)) = (answers.pop(), self.questions.last()) else {
            return false;
        };
        let score = if last == question.correct_answer {
            score.saturating_sub(1)
        } else {
            *score
        };
        self.state = SessionState::InProgress {
            index: self.questions.len() - 1,
            score,
            answers: std::mem::take(answers),
        };
        true
    }

    /// Back to the first question with a fresh question set.
    pub fn restart(
        &mut self,
        questions: Vec<QuizQuestion>,
        origin: QuestionOrigin,
    ) -> Result<(), QuizError> {
        *self = Self::new(questions, origin)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            question_text: format!("Question with answer {correct}?"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: correct,
            explanation: None,
            medication: None,
            medication_id: None,
        }
    }

    #[test]
    fn fallback_set_is_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let questions = shuffled_fallback_questions(&mut rng);
            assert!(questions.len() >= 3);
            for q in &questions {
                assert_eq!(q.options.len(), 4);
                assert!(q.correct_answer < 4);
            }
        }
    }

    #[test]
    fn shuffle_keeps_options_and_tracks_correct_answer() {
        let mut rng = StdRng::seed_from_u64(42);
        for original in fallback_questions() {
            let expected = original.options[original.correct_answer].clone();
            for _ in 0..20 {
                let shuffled = shuffle_options(original.clone(), &mut rng);

                let mut before = original.options.clone();
                let mut after = shuffled.options.clone();
                before.sort();
                after.sort();
                assert_eq!(before, after);
                assert_eq!(shuffled.options[shuffled.correct_answer], expected);
            }
        }
    }

    #[test]
    fn shuffle_eventually_moves_the_correct_answer() {
        let mut rng = StdRng::seed_from_u64(3);
        let positions: std::collections::HashSet<usize> = (0..100)
            .map(|_| shuffle_options(question(0), &mut rng).correct_answer)
            .collect();
        assert!(positions.len() > 1);
    }

    #[test]
    fn score_counts_correct_answers() {
        let questions = vec![question(0), question(1), question(2), question(3)];
        let submitted = [0, 2, 2, 1];
        let mut session = QuizSession::new(questions, QuestionOrigin::Fallback).unwrap();

        let mut outcome = None;
        for option in submitted {
            outcome = Some(session.answer(option).unwrap());
        }

        match outcome {
            Some(AnswerOutcome::Completed { attempt, correct }) => {
                assert!(!correct);
                assert_eq!(attempt.score, 2);
                assert_eq!(attempt.total_questions, 4);
                assert_eq!(attempt.answers, submitted.to_vec());
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(session.score(), 2);
    }

    #[test]
    fn completion_is_emitted_once() {
        let mut session = QuizSession::new(vec![question(1)], QuestionOrigin::Ai).unwrap();
        assert!(matches!(
            session.answer(1),
            Ok(AnswerOutcome::Completed { correct: true, .. })
        ));
        assert!(session.is_completed());
        assert_eq!(session.answer(1), Err(QuizError::AlreadyCompleted));
        assert_eq!(session.answers(), &[1]);
    }

    #[test]
    fn reopening_takes_back_only_the_final_answer() {
        let mut session =
            QuizSession::new(vec![question(0), question(1)], QuestionOrigin::Ai).unwrap();
        assert!(!session.reopen_final_question());

        session.answer(0).unwrap();
        let first = session.answer(1).unwrap();
        assert!(session.reopen_final_question());
        assert_eq!(
            session.state(),
            &SessionState::InProgress {
                index: 1,
                score: 1,
                answers: vec![0]
            }
        );

        // Resubmitting completes with the same attempt as before.
        assert_eq!(session.answer(1).unwrap(), first);
        assert!(session.is_completed());
    }

    #[test]
    fn out_of_range_option_does_not_advance() {
        let mut session =
            QuizSession::new(vec![question(0), question(1)], QuestionOrigin::Ai).unwrap();
        assert_eq!(
            session.answer(4),
            Err(QuizError::OptionOutOfRange {
                option: 4,
                options: 4
            })
        );
        assert_eq!(
            session.state(),
            &SessionState::InProgress {
                index: 0,
                score: 0,
                answers: vec![]
            }
        );
    }

    #[test]
    fn restart_resets_progress() {
        let mut session =
            QuizSession::new(vec![question(0), question(1)], QuestionOrigin::Ai).unwrap();
        session.answer(0).unwrap();
        session
            .restart(fallback_questions(), QuestionOrigin::Fallback)
            .unwrap();

        assert_eq!(session.origin(), QuestionOrigin::Fallback);
        assert_eq!(session.score(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(
            session.current_question().map(|q| q.question_text.as_str()),
            Some("What is the correct dosage of your medication?")
        );
    }

    #[test]
    fn empty_question_set_is_rejected() {
        assert_eq!(
            QuizSession::new(vec![], QuestionOrigin::Ai).unwrap_err(),
            QuizError::EmptyQuestionSet
        );
    }
}
