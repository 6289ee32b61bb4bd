//! URL → article → audio orchestration.
//!
//! ```text
//! run(url) → validate → SourceChain (renderer, then static fetch)
//!     → readability::parse → slug + uuid filename → SpeechSynthesizer
//!     → { title, text, audioUrl }
//! ```
//!
//! Each call is independent. The only shared state is the audio directory,
//! and filenames carry a v4 UUID so concurrent runs never collide.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, info, warn};
use uuid::Uuid;

use narro_core::readability;
use narro_core::text_prep::slugify;
use narro_core::types::{
    AUDIO_PATH_SEGMENT, AudioArtifact, ExtractionRequest, FetchSettings, RenderSettings,
    SavedArticle, SynthConfig, SynthesisJob,
};

use crate::fetch::{FetchError, StaticFetcher};
use crate::render::Renderer;
use crate::source::SourceChain;
use crate::synth::{SpeechSynthesizer, synthesizer_from_config};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("url is required")]
    Validation,
    #[error("Content extraction failed")]
    Extraction,
    #[error("{0}")]
    Synthesis(String),
    #[error("failed to prepare audio directory: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// HTTP status reported for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Extraction => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Synthesis(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct Pipeline {
    sources: SourceChain,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    audio_dir: PathBuf,
}

impl Pipeline {
    pub fn new(
        sources: SourceChain,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            sources,
            synthesizer,
            audio_dir: audio_dir.into(),
        }
    }

    /// Renderer first, static fetch as the fallback, provider from `synth`.
    pub fn standard(
        render: RenderSettings,
        fetch: &FetchSettings,
        synth: &SynthConfig,
        audio_dir: impl Into<PathBuf>,
    ) -> Result<Self, FetchError> {
        let sources = SourceChain::default()
            .then(Arc::new(Renderer::new(render)))
            .then(Arc::new(StaticFetcher::new(fetch)?));
        Ok(Self::new(sources, synthesizer_from_config(synth), audio_dir))
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Turn `request.url` into narrated audio.
    ///
    /// `public_base` is the externally visible origin used to build `audioUrl`.
    pub async fn run(
        &self,
        request: &ExtractionRequest,
        public_base: &str,
    ) -> Result<SavedArticle, PipelineError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(PipelineError::Validation);
        }

        let document = self.sources.retrieve(url).await.map_err(|e| {
            warn!(url, "no content source succeeded: {e}");
            PipelineError::Extraction
        })?;

        let article = readability::parse(&document.html, &document.base_url);
        if article.text.is_empty() {
            warn!(url, base_url = %document.base_url, "extraction produced no text");
            return Err(PipelineError::Extraction);
        }
        debug!(url, title = %article.title, chars = article.text.len(), "article extracted");

        let artifact = self
            .synthesize(&article.title, &article.text, public_base)
            .await?;

        info!(
            url,
            title = %article.title,
            file = %artifact.filename,
            path = %artifact.path.display(),
            provider = self.synthesizer.name(),
            "audio saved"
        );

        Ok(SavedArticle {
            title: article.title,
            text: article.text,
            audio_url: artifact.public_url,
        })
    }

    async fn synthesize(
        &self,
        title: &str,
        text: &str,
        public_base: &str,
    ) -> Result<AudioArtifact, PipelineError> {
        tokio::fs::create_dir_all(&self.audio_dir).await?;

        let filename = audio_filename(title, Uuid::new_v4());
        let job = SynthesisJob {
            text: text.to_string(),
            destination: self.audio_dir.join(&filename),
        };

        if let Err(e) = self
            .synthesizer
            .synthesize(&job.text, &job.destination)
            .await
        {
            if tokio::fs::try_exists(&job.destination).await.unwrap_or(false) {
                warn!(
                    path = %job.destination.display(),
                    "synthesis failed; partial audio file left in place"
                );
            }
            return Err(PipelineError::Synthesis(e.to_string()));
        }

        Ok(AudioArtifact {
            public_url: public_audio_url(public_base, &filename),
            filename,
            path: job.destination,
        })
    }
}

/// `{slug(title)}-{id}.mp3`
pub fn audio_filename(title: &str, id: Uuid) -> String {
    format!("{}-{id}.mp3", slugify(title))
}

/// Absolute URL of an audio file served under `/audio`.
pub fn public_audio_url(public_base: &str, filename: &str) -> String {
    format!(
        "{}/{AUDIO_PATH_SEGMENT}/{filename}",
        public_base.trim_end_matches('/')
    )
}
