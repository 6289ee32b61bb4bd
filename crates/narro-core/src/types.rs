//! Shared types for the narro article-to-audio pipeline.
//!
//! These types are used across narro-lib, narro-cli, and any client that
//! speaks the HTTP contract. Keeping them in narro-core means consumers can
//! depend on them without pulling in tokio, chromiumoxide, or reqwest.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─── Pipeline values ───────────────────────────────────────────────────────

/// A single inbound request to turn a page into audio.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractionRequest {
    pub url: String,
}

/// HTML obtained by a content source, together with the URL it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub html: String,
    /// Final URL after redirects. Relative references in `html` resolve against it.
    pub base_url: String,
}

/// Readable article pulled out of a [`RenderedDocument`].
///
/// `title` is never empty. `text` may be, which callers treat as a failed
/// extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    pub text: String,
}

/// Text headed for a synthesis provider, and where the audio should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisJob {
    pub text: String,
    pub destination: PathBuf,
}

/// A generated audio file and the places it can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    /// `{slug}-{uuid}.mp3`
    pub filename: String,
    pub path: PathBuf,
    pub public_url: String,
}

/// Successful `/save` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedArticle {
    pub title: String,
    pub text: String,
    pub audio_url: String,
}

/// `/health` payload. `t` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub ok: bool,
    pub t: u64,
}

/// Error body returned by every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ─── Browser identity ─────────────────────────────────────────────────────

/// User agent presented by both the renderer and the static fetcher.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

// ─── Configuration ────────────────────────────────────────────────────────

/// Headless browser settings.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Chromium binary. `None` lets the launcher search the usual locations.
    pub executable: Option<PathBuf>,
    /// Hard limit for navigation up to DOM construction.
    pub navigation_timeout: Duration,
    /// Best-effort wait for network activity to settle after navigation.
    pub idle_timeout: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            executable: None,
            navigation_timeout: Duration::from_secs(90),
            idle_timeout: Duration::from_secs(3),
        }
    }
}

/// Plain HTTP fetch settings.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 10,
        }
    }
}

/// ElevenLabs text-to-speech configuration.
#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    /// Empty means "not configured"; synthesis fails before any request is made.
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".into(),
            model_id: "eleven_multilingual_v2".into(),
            base_url: "https://api.elevenlabs.io".into(),
            stability: 0.4,
            similarity_boost: 0.8,
        }
    }
}

/// Local synthesis executable configuration.
///
/// The executable is invoked as
/// `{executable} --text <text> --out_path <file> --model_name <model>`.
#[derive(Debug, Clone)]
pub struct LocalTtsConfig {
    pub executable: PathBuf,
    pub model: String,
}

impl Default for LocalTtsConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tts"),
            model: "tts_models/en/ljspeech/vits".into(),
        }
    }
}

/// Which synthesis provider the process runs with. Chosen once at startup.
#[derive(Debug, Clone)]
pub enum SynthConfig {
    Remote(ElevenLabsConfig),
    Local(LocalTtsConfig),
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self::Remote(ElevenLabsConfig::default())
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root of the static tree. Audio lives under `{public_dir}/audio`.
    pub public_dir: PathBuf,
    /// Externally visible base address. Falls back to `http://{Host}` when unset.
    pub public_url: Option<String>,
}

impl ServerConfig {
    pub fn audio_dir(&self) -> PathBuf {
        self.public_dir.join(AUDIO_PATH_SEGMENT)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            public_url: None,
        }
    }
}

/// URL path segment (and directory name) under which audio is served.
pub const AUDIO_PATH_SEGMENT: &str = "audio";
