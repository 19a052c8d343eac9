use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

/// Route prefix under which saved files are served.
pub const AUDIO_ROUTE: &str = "/audio";

/// Writes synthesized speech into the uploads directory.
#[derive(Clone, Debug)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Saves `bytes` as `<prefix>-<millis>-<id>.mp3` and returns its public URL path.
    pub async fn save_mp3(&self, prefix: &str, bytes: &[u8]) -> std::io::Result<String> {
        let file_name = format!(
            "{prefix}-{}-{}.mp3",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        );
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        tracing::debug!("Saved {} bytes of audio to {}", bytes.len(), file_name);
        Ok(format!("{AUDIO_ROUTE}/{file_name}"))
    }
}
