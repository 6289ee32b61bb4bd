//! Plain HTTP retrieval, the fallback when the headless renderer fails.
//!
//! One GET with browser-like headers, redirects followed, no retries.

use std::fmt;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use narro_core::types::{self, FetchSettings, RenderedDocument};

/// Content types accepted as HTML.
const HTML_CONTENT_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fetch failed ({kind}): {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    UnsupportedContentType { content_type: Option<String> },
    Timeout,
    RedirectLimitExceeded,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::UnsupportedContentType {
                content_type: Some(ct),
            } => write!(f, "unsupported content type {ct}"),
            FailureKind::UnsupportedContentType { content_type: None } => {
                write!(f, "missing content type")
            }
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
}

impl StaticFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client })
    }

    /// GET `url` and return its HTML with the post-redirect URL.
    pub async fn fetch(&self, url: &str) -> Result<RenderedDocument, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .header(USER_AGENT, types::USER_AGENT)
            .header(ACCEPT_LANGUAGE, types::ACCEPT_LANGUAGE)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if !content_type.as_deref().is_some_and(is_html) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType { content_type },
                "response is not html",
            ));
        }

        let base_url = response.url().to_string();
        let html = response.text().await.map_err(map_reqwest_error)?;
        debug!(url, %base_url, bytes = html.len(), "static fetch complete");

        Ok(RenderedDocument { html, base_url })
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    HTML_CONTENT_TYPES
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(mime))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
