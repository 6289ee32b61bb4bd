//! Headless Chromium rendering, the primary way pages are retrieved.
//!
//! ```text
//! render(url) → BrowserSession::launch (fresh process, throwaway profile)
//!     → interceptor task: abort image / media / font / stylesheet requests
//!     → Page.navigate in the background
//!       until the main document fires DOMContentLoaded             (hard timeout)
//!     → same document fires networkIdle                             (best effort)
//!     → page.content() + document.URL
//!     → session.close()
//! ```
//!
//! Every call owns its browser and its profile directory. [`BrowserSession`]
//! closes both on the normal path and its `Drop` kills the process if the
//! render future errors out, times out, or is dropped mid-flight.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    self as cdp_fetch, ContinueRequestParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, LoaderId, ResourceType, SetExtraHttpHeadersParams,
    SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, FrameId, GetFrameTreeParams, NavigateParams,
    SetLifecycleEventsEnabledParams,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use tempfile::TempDir;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use narro_core::types::{ACCEPT_LANGUAGE, RenderSettings, RenderedDocument, USER_AGENT};

/// How long `Browser.close` may take before the process is killed instead.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

const DOM_CONTENT_LOADED: &str = "DOMContentLoaded";
const NETWORK_IDLE: &str = "networkIdle";

/// Scheme Chromium uses for its built-in network error pages.
const ERROR_PAGE_SCHEME: &str = "chrome-error:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("page error: {0}")]
    Page(String),
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    settings: RenderSettings,
}

impl Renderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    /// Load `url` in a fresh headless browser and return the hydrated HTML.
    pub async fn render(&self, url: &str) -> Result<RenderedDocument, RenderError> {
        let mut session = BrowserSession::launch(&self.settings).await?;
        let result = self.render_in(&mut session, url).await;
        session.close().await;
        result
    }

    async fn render_in(
        &self,
        session: &mut BrowserSession,
        url: &str,
    ) -> Result<RenderedDocument, RenderError> {
        let page = session.new_page().await?;
        configure_identity(&page).await?;
        session.block_heavy_resources(&page).await?;

        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(page_err)?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(page_err)?;
        let blank = page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(page_err)?
            .result
            .frame_tree
            .frame;
        let mut document = DocumentLifecycle::new(blank.id, blank.loader_id);

        let timeout = self.settings.navigation_timeout;
        tokio::time::timeout(
            timeout,
            navigate_until_interactive(session, &page, url, &mut lifecycle, &mut document),
        )
        .await
        .map_err(|_| RenderError::NavigationTimeout(timeout))??;

        let idle = self.settings.idle_timeout;
        let settled = tokio::time::timeout(idle, async {
            while let Some(event) = lifecycle.next().await {
                if document.reached(&event.frame_id, &event.loader_id, &event.name, NETWORK_IDLE) {
                    break;
                }
            }
        })
        .await;
        if settled.is_err() {
            debug!(url, ?idle, "network did not settle; continuing");
        }

        let html = page.content().await.map_err(page_err)?;
        let base_url = document_url(&page, url).await?;

        debug!(url, %base_url, bytes = html.len(), "render complete");
        Ok(RenderedDocument { html, base_url })
    }
}

async fn configure_identity(page: &Page) -> Result<(), RenderError> {
    let mut agent = SetUserAgentOverrideParams::new(USER_AGENT);
    agent.accept_language = Some(ACCEPT_LANGUAGE.to_string());
    page.execute(agent).await.map_err(page_err)?;

    let headers = Headers::new(serde_json::json!({ "accept-language": ACCEPT_LANGUAGE }));
    page.execute(SetExtraHttpHeadersParams::new(headers))
        .await
        .map_err(page_err)?;
    Ok(())
}

/// Start navigation and return once the main document has been parsed.
///
/// chromiumoxide only answers `Page.navigate` after every frame has fired
/// `load`, so the command runs in its own task and DOMContentLoaded of the
/// committed document usually finishes first.
async fn navigate_until_interactive(
    session: &mut BrowserSession,
    page: &Page,
    url: &str,
    lifecycle: &mut EventStream<EventLifecycleEvent>,
    document: &mut DocumentLifecycle,
) -> Result<(), RenderError> {
    let mut navigation: JoinHandle<_> = {
        let page = page.clone();
        let params = NavigateParams::new(url);
        tokio::spawn(async move { page.execute(params).await })
    };
    session.track(navigation.abort_handle());

    loop {
        tokio::select! {
            joined = &mut navigation => {
                let navigated = joined
                    .map_err(|e| RenderError::Navigation(e.to_string()))?
                    .map_err(|e| RenderError::Navigation(e.to_string()))?
                    .result;
                if let Some(error) = navigated.error_text {
                    return Err(RenderError::Navigation(error));
                }
                if let Some(loader) = navigated.loader_id {
                    document.adopt(loader);
                }
                return Ok(());
            }
            event = lifecycle.next() => {
                let Some(event) = event else {
                    return Err(RenderError::Page("lifecycle event stream closed".into()));
                };
                if document.reached(&event.frame_id, &event.loader_id, &event.name, DOM_CONTENT_LOADED) {
                    return Ok(());
                }
            }
        }
    }
}

/// Final URL of the loaded document, or `requested` if the page reports none.
async fn document_url(page: &Page, requested: &str) -> Result<String, RenderError> {
    let href: String = page
        .evaluate("document.URL")
        .await
        .map_err(page_err)?
        .into_value()
        .map_err(|e| RenderError::Page(e.to_string()))?;

    if is_error_page(&href) {
        return Err(RenderError::Navigation(format!(
            "browser showed an error page for {requested}"
        )));
    }
    if href.is_empty() || href == "about:blank" {
        return Ok(requested.to_string());
    }
    Ok(href)
}

fn is_error_page(href: &str) -> bool {
    href.starts_with(ERROR_PAGE_SCHEME)
}

/// Lifecycle events of the document our navigation commits in the main frame.
///
/// Events of the initial `about:blank` document and of child frames are
/// ignored. The first other loader seen in the main frame is the navigated
/// document.
#[derive(Debug)]
struct DocumentLifecycle {
    frame: FrameId,
    blank: LoaderId,
    loader: Option<LoaderId>,
}

impl DocumentLifecycle {
    fn new(frame: FrameId, blank: LoaderId) -> Self {
        Self {
            frame,
            blank,
            loader: None,
        }
    }

    /// Pin the document to the loader reported by `Page.navigate`.
    fn adopt(&mut self, loader: LoaderId) {
        self.loader = Some(loader);
    }

    /// Feed one lifecycle event. True when it is `milestone` of the tracked document.
    fn reached(&mut self, frame: &FrameId, loader: &LoaderId, name: &str, milestone: &str) -> bool {
        if *frame != self.frame || *loader == self.blank {
            return false;
        }
        let tracked = self.loader.get_or_insert_with(|| loader.clone());
        *tracked == *loader && name == milestone
    }
}

/// Empty user data directory for one browser process.
fn fresh_profile() -> Result<TempDir, RenderError> {
    tempfile::Builder::new()
        .prefix("narro-chromium-")
        .tempdir()
        .map_err(|e| RenderError::Launch(format!("cannot create browser profile: {e}")))
}

fn is_blocked(resource: &ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::Image | ResourceType::Media | ResourceType::Font | ResourceType::Stylesheet
    )
}

fn page_err(err: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Page(err.to_string())
}

// ─── Scoped browser process ────────────────────────────────────────────────

/// Owns one browser process, its profile directory and the tasks driving it.
///
/// Call [`BrowserSession::close`] on the way out. If that never happens the
/// `Drop` impl aborts the tasks, kills the process and then removes the
/// profile.
struct BrowserSession {
    browser: Option<Browser>,
    profile: Option<TempDir>,
    handler: JoinHandle<()>,
    tasks: Vec<AbortHandle>,
}

impl BrowserSession {
    async fn launch(settings: &RenderSettings) -> Result<Self, RenderError> {
        let profile = fresh_profile()?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .user_data_dir(profile.path())
            .request_timeout(settings.navigation_timeout + CLOSE_GRACE);
        if let Some(executable) = settings.executable.as_ref() {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler: {e}");
                }
            }
        });

        debug!(profile = %profile.path().display(), "browser launched");
        Ok(Self {
            browser: Some(browser),
            profile: Some(profile),
            handler,
            tasks: Vec::new(),
        })
    }

    /// Abort `task` when the session ends.
    fn track(&mut self, task: AbortHandle) {
        self.tasks.push(task);
    }

    async fn new_page(&self) -> Result<Page, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Launch("browser already closed".into()))?;
        browser.new_page("about:blank").await.map_err(page_err)
    }

    /// Pause every request and fail the heavy ones before they hit the network.
    async fn block_heavy_resources(&mut self, page: &Page) -> Result<(), RenderError> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(page_err)?;
        page.execute(cdp_fetch::EnableParams::default())
            .await
            .map_err(page_err)?;

        let page = page.clone();
        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let request_id = event.request_id.clone();
                let outcome = if is_blocked(&event.resource_type) {
                    page.execute(FailRequestParams::new(request_id, ErrorReason::BlockedByClient))
                        .await
                        .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(request_id))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = outcome {
                    debug!("interceptor: {e}");
                }
            }
        });
        self.track(interceptor.abort_handle());
        Ok(())
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    async fn close(mut self) {
        self.abort_tasks();
        if let Some(mut browser) = self.browser.take() {
            match tokio::time::timeout(CLOSE_GRACE, browser.close()).await {
                Ok(Ok(_)) => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, browser.wait()).await;
                }
                Ok(Err(e)) => {
                    warn!("browser close failed, killing: {e}");
                    let _ = browser.kill().await;
                }
                Err(_) => {
                    warn!("browser close timed out, killing");
                    let _ = browser.kill().await;
                }
            }
        }
        self.handler.abort();
        // Removed only once the process is gone.
        drop(self.profile.take());
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.abort_tasks();
        self.handler.abort();
        let profile = self.profile.take();
        if let Some(mut browser) = self.browser.take() {
            warn!("browser session dropped without close; killing process");
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let _ = browser.kill().await;
                        drop(profile);
                    });
                }
                // Browser's own Drop kills the child.
                Err(_) => {
                    drop(browser);
                    drop(profile);
                }
            }
        }
    }
}
