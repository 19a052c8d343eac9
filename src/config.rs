use base64::{engine::general_purpose, Engine as _};
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_PORT: &str = "3001";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{0} must be base64")]
    NotBase64(&'static str),
    #[error("{0} is too short (need at least 32 bytes)")]
    WeakKey(&'static str),
    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AiConfig {
    pub api_key: String,
    pub api_base: String,
    pub chat_model: String,
    pub vision_model: String,
    pub tts_voice: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub session_key: Vec<u8>,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub ai: AiConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let session_key_b64 = get("SESSION_KEY").ok_or(ConfigError::Missing("SESSION_KEY"))?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .map_err(|_| ConfigError::NotBase64("SESSION_KEY"))?;
        if session_key.len() < 32 {
            return Err(ConfigError::WeakKey("SESSION_KEY"));
        }

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| DEFAULT_PORT.to_string());
            format!("0.0.0.0:{port}")
        });

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "MAX_UPLOAD_BYTES",
                value: raw,
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let ai = AiConfig {
            api_key: get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?,
            api_base: get("OPENAI_API_BASE")
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            vision_model: get("VISION_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            tts_voice: get("TTS_VOICE").unwrap_or_else(|| "alloy".to_string()),
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            session_key,
            uploads_dir: get("UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            max_upload_bytes,
            ai,
        })
    }
}
