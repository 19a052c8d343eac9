use crate::domain::models::JournalEntry;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JournalInsight {
    pub pattern: String,
    pub explanation: String,
    pub recommendations: Vec<String>,
}

/// Minimum repetitions before a symptom/medication pairing counts as a pattern.
const PATTERN_THRESHOLD: usize = 2;

pub fn detect_pattern(entries: &[JournalEntry]) -> JournalInsight {
    if entries.len() < 2 {
        return JournalInsight {
            pattern: "Keep adding entries to get personalized insights about your symptoms and medications."
                .to_string(),
            explanation:
                "The more data you provide, the better we can identify patterns and correlations."
                    .to_string(),
            recommendations: vec![
                "Add entries after each medication dose".to_string(),
                "Be specific about timing and symptoms".to_string(),
                "Include any relevant context".to_string(),
            ],
        };
    }

    // (medication, symptoms) -> (count, first seen)
    let mut combos: HashMap<(String, Vec<String>), (usize, usize)> = HashMap::new();
    for (position, entry) in entries.iter().enumerate() {
        let Some(medication) = entry.medication.as_deref().filter(|m| !m.trim().is_empty()) else {
            continue;
        };
        if entry.symptoms.is_empty() {
            continue;
        }
        let slot = combos
            .entry((medication.to_string(), entry.symptoms.clone()))
            .or_insert((0, position));
        slot.0 += 1;
    }

    let most_frequent = combos
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        });

    match most_frequent {
        Some(((medication, symptoms), (count, _))) if count >= PATTERN_THRESHOLD => JournalInsight {
            pattern: format!(
                "You've reported {} {count} times after taking {medication}.",
                symptoms.join(", ")
            ),
            explanation: format!(
                "This could indicate a side effect of {medication}. Side effects often occur within a specific timeframe after taking medication."
            ),
            recommendations: vec![
                format!("Consider taking {medication} with food if possible"),
                "Discuss these symptoms with your healthcare provider".to_string(),
                "Monitor if the symptoms improve or worsen over time".to_string(),
            ],
        },
        _ => JournalInsight {
            pattern: "We're starting to collect data about your symptoms and medications.".to_string(),
            explanation: "As you add more entries, we'll be able to identify patterns and provide more specific insights."
                .to_string(),
            recommendations: vec![
                "Continue logging your symptoms after each medication dose".to_string(),
                "Be consistent with your entries".to_string(),
                "Include timing information when possible".to_string(),
            ],
        },
    }
}
