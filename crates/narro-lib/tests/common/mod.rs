#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use narro_lib::narro_core::types::RenderedDocument;
use narro_lib::render::RenderError;
use narro_lib::source::{ContentSource, SourceError};
use narro_lib::synth::{SpeechSynthesizer, SynthError};

/// Ten bytes standing in for an mp3.
pub const FAKE_AUDIO: &[u8; 10] = b"ID3\x04\x00\x00narr";

/// Renderer stand-in that always times out.
#[derive(Default)]
pub struct TimingOutRenderer {
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ContentSource for TimingOutRenderer {
    fn name(&self) -> &'static str {
        "renderer"
    }

    async fn retrieve(&self, _url: &str) -> Result<RenderedDocument, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RenderError::NavigationTimeout(Duration::from_secs(90)).into())
    }
}

/// Source that returns fixed HTML for any URL.
pub struct StaticHtml {
    pub html: String,
    pub calls: AtomicUsize,
}

impl StaticHtml {
    pub fn new(html: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            html: html.into(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl ContentSource for StaticHtml {
    fn name(&self) -> &'static str {
        "static-html"
    }

    async fn retrieve(&self, url: &str) -> Result<RenderedDocument, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedDocument {
            html: self.html.clone(),
            base_url: url.to_string(),
        })
    }
}

/// Synthesizer that writes [`FAKE_AUDIO`] and remembers what it was given.
#[derive(Default)]
pub struct FixedAudio {
    pub calls: AtomicUsize,
    pub texts: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FixedAudio {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn max_chars(&self) -> usize {
        usize::MAX
    }

    async fn synthesize(&self, text: &str, destination: &Path) -> Result<(), SynthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().push(text.to_string());
        tokio::fs::write(destination, FAKE_AUDIO).await?;
        Ok(())
    }
}

/// Synthesizer that always fails like a rejecting provider.
pub struct RejectingSynth;

#[async_trait::async_trait]
impl SpeechSynthesizer for RejectingSynth {
    fn name(&self) -> &'static str {
        "rejecting"
    }

    fn max_chars(&self) -> usize {
        4_000
    }

    async fn synthesize(&self, _text: &str, _destination: &Path) -> Result<(), SynthError> {
        Err(SynthError::Provider("ElevenLabs error 401: invalid api key".into()))
    }
}

pub const ARTICLE_HTML: &str = r#"<!doctype html>
<html>
  <head><title>Quiet Rivers</title></head>
  <body>
    <nav><a href="/">Home</a></nav>
    <article><p>Rivers carve valleys slowly, grain by grain.</p></article>
  </body>
</html>"#;

pub const ARTICLE_TEXT: &str = "Rivers carve valleys slowly, grain by grain.";

/// Regular files directly under `dir` (none if it does not exist).
pub fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}
