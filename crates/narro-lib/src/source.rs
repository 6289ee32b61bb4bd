//! Ordered content retrieval strategies.
//!
//! A [`SourceChain`] tries each [`ContentSource`] in turn and stops at the
//! first one that produces HTML. Failures before that point are logged and
//! swallowed; only an exhausted chain is reported to the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use narro_core::types::RenderedDocument;

use crate::fetch::{FetchError, StaticFetcher};
use crate::render::{RenderError, Renderer};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("all content sources failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// One way of turning a URL into HTML.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn retrieve(&self, url: &str) -> Result<RenderedDocument, SourceError>;
}

#[async_trait::async_trait]
impl ContentSource for Renderer {
    fn name(&self) -> &'static str {
        "renderer"
    }

    async fn retrieve(&self, url: &str) -> Result<RenderedDocument, SourceError> {
        Ok(self.render(url).await?)
    }
}

#[async_trait::async_trait]
impl ContentSource for StaticFetcher {
    fn name(&self) -> &'static str {
        "static-fetch"
    }

    async fn retrieve(&self, url: &str) -> Result<RenderedDocument, SourceError> {
        Ok(self.fetch(url).await?)
    }
}

#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn ContentSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Arc<dyn ContentSource>>) -> Self {
        Self { sources }
    }

    /// Append a lower-priority source.
    pub fn then(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub async fn retrieve(&self, url: &str) -> Result<RenderedDocument, SourceError> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.retrieve(url).await {
                Ok(document) => {
                    debug!(url, source = source.name(), "content retrieved");
                    return Ok(document);
                }
                Err(e) => {
                    warn!(url, source = source.name(), "content source failed, trying next: {e}");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }

        Err(SourceError::Exhausted(failures))
    }
}
