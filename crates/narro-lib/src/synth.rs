//! Speech synthesis providers.
//!
//! Both providers accept the same article text and leave an audio file at the
//! requested path. Text is whitespace-normalized and cut to the provider's
//! limit before it leaves the process.
//!
//! A failure midway through writing leaves whatever was written on disk.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use narro_core::text_prep::{LOCAL_MAX_CHARS, REMOTE_MAX_CHARS, prepare_for_synthesis};
use narro_core::types::{ElevenLabsConfig, LocalTtsConfig, SynthConfig};

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Missing {0}")]
    MissingCredential(&'static str),
    #[error("{0}")]
    Provider(String),
    #[error("audio write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns text into an audio file at `destination`.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Characters kept after whitespace normalization.
    fn max_chars(&self) -> usize;

    async fn synthesize(&self, text: &str, destination: &Path) -> Result<(), SynthError>;
}

/// Build the provider selected at startup.
pub fn synthesizer_from_config(config: &SynthConfig) -> Arc<dyn SpeechSynthesizer> {
    match config {
        SynthConfig::Remote(remote) => Arc::new(ElevenLabsSynthesizer::new(remote.clone())),
        SynthConfig::Local(local) => Arc::new(LocalSynthesizer::new(local.clone())),
    }
}

// ─── ElevenLabs ─────────────────────────────────────────────────────────────

pub struct ElevenLabsSynthesizer {
    config: ElevenLabsConfig,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: ElevenLabsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.voice_id
        )
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    fn max_chars(&self) -> usize {
        REMOTE_MAX_CHARS
    }

    async fn synthesize(&self, text: &str, destination: &Path) -> Result<(), SynthError> {
        if self.config.api_key.is_empty() {
            return Err(SynthError::MissingCredential("ELEVENLABS_API_KEY"));
        }

        let text = prepare_for_synthesis(text, self.max_chars());
        let body = serde_json::json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
            },
        });

        debug!("elevenlabs: POST {} chars", text.chars().count());

        let resp = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "audio/mpeg")
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthError::Provider(format!("ElevenLabs request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let msg = resp.text().await.unwrap_or_default();
            return Err(SynthError::Provider(format!(
                "ElevenLabs error {}: {msg}",
                status.as_u16()
            )));
        }

        // Chunks go straight to disk.
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SynthError::Provider(format!("ElevenLabs stream interrupted: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        debug!("elevenlabs: wrote {written} bytes to {}", destination.display());
        Ok(())
    }
}

// ─── Local executable ───────────────────────────────────────────────────────

pub struct LocalSynthesizer {
    config: LocalTtsConfig,
}

impl LocalSynthesizer {
    pub fn new(config: LocalTtsConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for LocalSynthesizer {
    fn name(&self) -> &'static str {
        "local"
    }

    fn max_chars(&self) -> usize {
        LOCAL_MAX_CHARS
    }

    async fn synthesize(&self, text: &str, destination: &Path) -> Result<(), SynthError> {
        let text = prepare_for_synthesis(text, self.max_chars());

        debug!(
            "local tts: {} ({} chars) → {}",
            self.config.executable.display(),
            text.chars().count(),
            destination.display()
        );

        let output = tokio::process::Command::new(&self.config.executable)
            .arg("--text")
            .arg(&text)
            .arg("--out_path")
            .arg(destination)
            .arg("--model_name")
            .arg(&self.config.model)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            Err(SynthError::Provider(format!(
                "{} exited with {}",
                self.config.executable.display(),
                output.status
            )))
        } else {
            Err(SynthError::Provider(stderr))
        }
    }
}
