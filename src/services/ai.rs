use crate::config::AiConfig;
use crate::domain::models::{
    JournalAnalysis, MedicationBrief, QuizQuestion, ScannedMedication, Severity,
};
use crate::services::quiz::QuizGenerator;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ImageUrlDetail,
    ImageUrlArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub const QUIZ_QUESTION_COUNT: usize = 5;
pub const DEFAULT_NURSE_NAME: &str = "Sarah";

const ASSISTANT_PROMPT: &str =
    "You are a helpful medical assistant. Keep your responses concise and clear.";

const MEDICATION_VOICE_PROMPT: &str = "You are a helpful medical assistant. Keep your responses concise, clear, and focused on medication information. Make sure to maintain a friendly and professional tone.";

const QUIZ_SYSTEM_PROMPT: &str =
    "You are a medical quiz generator that creates educational questions about medications. Reply with a single JSON object and nothing else.";

const SCANNER_PROMPT: &str = r#"You are a medical assistant specialized in identifying medicines from photos.
Reply with a single JSON object and nothing else:
{"name": "...", "dosage": "...", "frequency": "...", "notes": "additional important information, warnings, or special instructions"}
If you cannot identify the medicine or any required field with high confidence, reply with
{"error": "specific reason why identification failed"}"#;

const JOURNAL_ANALYSIS_PROMPT: &str = r#"You extract structured data from a patient's symptom journal entry.
Reply with a single JSON object and nothing else:
{"symptoms": ["..."], "medication": "name or null", "severity": "mild|moderate|severe or null", "timeAfterDose": minutes or null, "confidence": 0.0-1.0}"#;

static LABELED_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Medication Name:\s*(.+)").expect("valid scanner pattern"));
static LABELED_DOSAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Dosage:\s*(.+)").expect("valid scanner pattern"));
static LABELED_FREQUENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Frequency:\s*(.+)").expect("valid scanner pattern"));
static LABELED_NOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Notes:\s*(.+)").expect("valid scanner pattern"));

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI provider error: {0}")]
    Provider(#[from] OpenAIError),
    #[error("AI provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
    #[error("AI response is missing {0}")]
    MissingField(&'static str),
    #[error("{0}")]
    Refused(String),
}

pub type AiResult<T> = Result<T, AiError>;

#[derive(Clone)]
pub struct AiService {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    config: AiConfig,
}

impl AiService {
    pub fn new(config: AiConfig) -> Self {
        let openai = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());
        Self {
            client: Client::with_config(openai),
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: Vec<ChatCompletionRequestMessage>,
        max_tokens: Option<u16>,
    ) -> AiResult<String> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model).messages(messages).temperature(0.7);
        if let Some(limit) = max_tokens {
            args.max_tokens(limit);
        }
        let request = args.build()?;

        let resp = self.client.chat().create(request).await?;
        resp.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or(AiError::MissingField("message content"))
    }

    async fn chat(&self, system: &str, user: &str, max_tokens: Option<u16>) -> AiResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()?
                .into(),
        ];
        self.complete(&self.config.chat_model, messages, max_tokens)
            .await
    }

    pub async fn transcribe(
        &self,
        audio_bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> AiResult<String> {
        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio_bytes)
                    .file_name(file_name.to_string())
                    .mime_str(mime)?,
            );

        let resp = self
            .http
            .post(format!("{}/audio/transcriptions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let json: serde_json::Value = resp.json().await?;
        json.get("text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or(AiError::MissingField("transcription text"))
    }

    /// Synthesizes `text` into MP3 bytes.
    pub async fn speak(&self, text: &str) -> AiResult<Vec<u8>> {
        let body = serde_json::json!({
            "model": "tts-1",
            "voice": self.config.tts_voice,
            "input": text,
        });

        let resp = self
            .http
            .post(format!("{}/audio/speech", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn answer_question(&self, transcript: &str) -> AiResult<String> {
        self.chat(ASSISTANT_PROMPT, transcript, None).await
    }

    pub async fn narrate_medication(&self, text: &str) -> AiResult<String> {
        self.chat(MEDICATION_VOICE_PROMPT, text, None).await
    }

    pub async fn nurse_reply(&self, entry: &str, nurse_name: &str) -> AiResult<String> {
        let system = format!(
            "You are {nurse_name}, a friendly and knowledgeable AI nurse assistant.\n\
             Provide personalized medical advice based on the user's journal entry.\n\
             Be empathetic, professional, and concise.\n\
             If the user mentions specific symptoms, medications, or concerns, address them directly.\n\
             End your response with a follow-up question to encourage continued dialogue."
        );
        self.chat(&system, entry, None).await
    }

    pub async fn analyze_journal(&self, entry: &str) -> AiResult<JournalAnalysis> {
        let content = self.chat(JOURNAL_ANALYSIS_PROMPT, entry, Some(300)).await?;
        parse_journal_analysis(&content)
    }

    pub async fn recognize_medication(
        &self,
        image_bytes: &[u8],
        mime: &str,
    ) -> AiResult<(ScannedMedication, String)> {
        let data_url = format!(
            "data:{mime};base64,{}",
            general_purpose::STANDARD.encode(image_bytes)
        );

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SCANNER_PROMPT)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(vec![
                    ChatCompletionRequestMessageContentPartTextArgs::default()
                        .text("Please identify this medicine and provide the information in the specified format.")
                        .build()?
                        .into(),
                    ChatCompletionRequestMessageContentPartImageArgs::default()
                        .image_url(
                            ImageUrlArgs::default()
                                .url(data_url)
                                .detail(ImageUrlDetail::High)
                                .build()?,
                        )
                        .build()?
                        .into(),
                ])
                .build()?
                .into(),
        ];

        let content = self
            .complete(&self.config.vision_model, messages, Some(500))
            .await?;
        let scanned = parse_scan_reply(&content)?;
        Ok((scanned, content))
    }
}

#[async_trait]
impl QuizGenerator for AiService {
    async fn generate_questions(
        &self,
        medications: &[MedicationBrief],
    ) -> AiResult<Vec<QuizQuestion>> {
        let content = self
            .chat(QUIZ_SYSTEM_PROMPT, &quiz_prompt(medications), Some(1500))
            .await?;
        parse_quiz_reply(&content)
    }
}

fn quiz_prompt(medications: &[MedicationBrief]) -> String {
    let listing = medications
        .iter()
        .map(|m| match &m.id {
            Some(id) => format!("- {} (id {}): {}, {}", m.name, id, m.dosage, m.frequency),
            None => format!("- {}: {}, {}", m.name, m.dosage, m.frequency),
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Create a medication knowledge quiz with {QUIZ_QUESTION_COUNT} multiple-choice questions based on these medications:
{listing}

Each question covers one medication and one of these topics:
1. Proper dosage
2. Timing/frequency
3. What to do if a dose is missed
4. Potential side effects
5. Drug interactions

Reply with this JSON structure:
{{
  "questions": [
    {{
      "questionText": "Question text here",
      "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
      "correctAnswer": 0,
      "medicationName": "exact medication name from the list",
      "medicationId": "medication id from the list",
      "explanation": "Brief explanation of the correct answer"
    }}
  ]
}}

Every question has exactly 4 options. Randomize the position of the correct answer."#
    )
}

/// Outermost `{...}` span, for replies wrapped in prose or a code fence.
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

fn parse_json_reply<T: DeserializeOwned>(content: &str) -> AiResult<T> {
    match serde_json::from_str(content.trim()) {
        Ok(value) => Ok(value),
        Err(first) => {
            let candidate = extract_json_object(content)
                .ok_or_else(|| AiError::MalformedResponse(first.to_string()))?;
            serde_json::from_str(candidate).map_err(|e| AiError::MalformedResponse(e.to_string()))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizReply {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
    question_text: String,
    options: Vec<String>,
    correct_answer: usize,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default, alias = "medication")]
    medication_name: Option<String>,
    #[serde(default)]
    medication_id: Option<String>,
}

pub fn parse_quiz_reply(content: &str) -> AiResult<Vec<QuizQuestion>> {
    let reply: QuizReply = parse_json_reply(content)?;
    let mut questions: Vec<QuizQuestion> = reply
        .questions
        .into_iter()
        .map(|q| QuizQuestion {
            question_text: q.question_text,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
            medication: q.medication_name,
            medication_id: q.medication_id,
        })
        .collect();

    if questions.is_empty() {
        return Err(AiError::MalformedResponse("no questions".into()));
    }
    if let Some(bad) = questions.iter().find(|q| !q.is_well_formed()) {
        return Err(AiError::MalformedResponse(format!(
            "question {:?} needs 4 options and an in-range answer",
            bad.question_text
        )));
    }
    questions.truncate(QUIZ_QUESTION_COUNT);
    Ok(questions)
}

#[derive(Deserialize)]
struct ScanReply {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dosage: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub fn parse_scan_reply(content: &str) -> AiResult<ScannedMedication> {
    let trimmed = content.trim();
    if let Some(reason) = trimmed.strip_prefix("Error:") {
        return Err(AiError::Refused(reason.trim().to_string()));
    }

    let reply = match parse_json_reply::<ScanReply>(trimmed) {
        Ok(reply) => reply,
        Err(_) => parse_labeled_scan(trimmed),
    };

    if let Some(reason) = reply.error.filter(|r| !r.trim().is_empty()) {
        return Err(AiError::Refused(reason.trim().to_string()));
    }

    let required = |value: Option<String>, field: &'static str| {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AiError::MissingField(field))
    };

    Ok(ScannedMedication {
        name: required(reply.name, "medication name")?,
        dosage: required(reply.dosage, "dosage")?,
        frequency: required(reply.frequency, "frequency")?,
        notes: reply
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
    })
}

fn parse_labeled_scan(content: &str) -> ScanReply {
    let capture = |pattern: &Regex| {
        pattern
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };
    ScanReply {
        name: capture(&LABELED_NAME),
        dosage: capture(&LABELED_DOSAGE),
        frequency: capture(&LABELED_FREQUENCY),
        notes: capture(&LABELED_NOTES),
        error: None,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReply {
    #[serde(default)]
    symptoms: Vec<String>,
    #[serde(default)]
    medication: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    time_after_dose: Option<f64>,
    #[serde(default)]
    confidence: Option<f32>,
}

pub fn parse_journal_analysis(content: &str) -> AiResult<JournalAnalysis> {
    let reply: AnalysisReply = parse_json_reply(content)?;
    Ok(JournalAnalysis {
        symptoms: reply
            .symptoms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        medication: reply.medication.filter(|m| !m.trim().is_empty()),
        severity: reply
            .severity
            .as_deref()
            .and_then(|s| Severity::try_from(s).ok()),
        time_after_dose: reply
            .time_after_dose
            .filter(|m| m.is_finite() && *m >= 0.0)
            .map(|m| m.round() as i32),
        confidence: reply.confidence.map(|c| c.clamp(0.0, 1.0)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIZ_JSON: &str = r#"{"questions":[{"questionText":"How much Metformin should you take?","options":["500mg","1000mg","1500mg","2000mg"],"correctAnswer":1,"medicationName":"Metformin","medicationId":"m1","explanation":"As prescribed."}]}"#;

    #[test]
    fn parses_typed_quiz_reply() {
        let questions = parse_quiz_reply(QUIZ_JSON).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer, 1);
        assert_eq!(questions[0].medication.as_deref(), Some("Metformin"));
        assert_eq!(questions[0].medication_id.as_deref(), Some("m1"));
    }

    #[test]
    fn parses_quiz_reply_wrapped_in_a_code_fence() {
        let fenced = format!("Here is your quiz:\n```json\n{QUIZ_JSON}\n```");
        assert_eq!(parse_quiz_reply(&fenced).unwrap().len(), 1);
    }

    #[test]
    fn rejects_questions_with_wrong_option_count() {
        let reply = r#"{"questions":[{"questionText":"Q?","options":["a","b","c"],"correctAnswer":0}]}"#;
        assert!(matches!(parse_quiz_reply(reply), Err(AiError::MalformedResponse(_))));

        let out_of_range = r#"{"questions":[{"questionText":"Q?","options":["a","b","c","d"],"correctAnswer":4}]}"#;
        assert!(parse_quiz_reply(out_of_range).is_err());
    }

    #[test]
    fn rejects_unparseable_or_empty_quiz() {
        assert!(parse_quiz_reply("Sorry, I can't help with that.").is_err());
        assert!(parse_quiz_reply(r#"{"questions":[]}"#).is_err());
    }

    #[test]
    fn truncates_extra_questions() {
        let question = r#"{"questionText":"Q?","options":["a","b","c","d"],"correctAnswer":2}"#;
        let reply = format!("{{\"questions\":[{}]}}", vec![question; 7].join(","));
        assert_eq!(parse_quiz_reply(&reply).unwrap().len(), QUIZ_QUESTION_COUNT);
    }

    #[test]
    fn parses_scan_json() {
        let scanned = parse_scan_reply(
            r#"{"name":"Ibuprofen","dosage":"200 mg","frequency":"Every 6 hours","notes":"Take with food"}"#,
        )
        .unwrap();
        assert_eq!(scanned.name, "Ibuprofen");
        assert_eq!(scanned.notes.as_deref(), Some("Take with food"));
    }

    #[test]
    fn parses_labeled_scan_fallback() {
        let reply = "Medication Name: Amoxicillin\nDosage: 500 mg\nFrequency: Three times daily\nNotes: Finish the course";
        let scanned = parse_scan_reply(reply).unwrap();
        assert_eq!(scanned.name, "Amoxicillin");
        assert_eq!(scanned.dosage, "500 mg");
        assert_eq!(scanned.frequency, "Three times daily");
        assert_eq!(scanned.notes.as_deref(), Some("Finish the course"));
    }

    #[test]
    fn scan_refusals_and_missing_fields() {
        assert!(matches!(
            parse_scan_reply("Error: label is not readable"),
            Err(AiError::Refused(reason)) if reason == "label is not readable"
        ));
        assert!(matches!(
            parse_scan_reply(r#"{"error":"blurry photo"}"#),
            Err(AiError::Refused(_))
        ));
        assert!(matches!(
            parse_scan_reply("Medication Name: Aspirin\nDosage: 81 mg"),
            Err(AiError::MissingField("frequency"))
        ));
    }

    #[test]
    fn parses_journal_analysis_leniently() {
        let analysis = parse_journal_analysis(
            r#"{"symptoms":["nausea"," "],"medication":"Metformin","severity":"Moderate","timeAfterDose":45.4,"confidence":1.3}"#,
        )
        .unwrap();
        assert_eq!(analysis.symptoms, vec!["nausea".to_string()]);
        assert_eq!(analysis.severity, Some(Severity::Moderate));
        assert_eq!(analysis.time_after_dose, Some(45));
        assert_eq!(analysis.confidence, Some(1.0));
    }
}
