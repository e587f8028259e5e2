//! Browser automation seam
//!
//! The engine talks to the browser only through the [`Browser`] trait, so the
//! navigation steps and the scroll loop run unchanged against Chrome or an
//! in-memory page model. Elements are opaque handles owned by the
//! implementation.

mod chrome;

pub use chrome::{ChromeBrowser, ChromeLauncher};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a browser implementation
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Element is no longer attached to the page")]
    StaleElement,

    #[error("Click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

impl DriverError {
    /// Transport or startup failures worth retrying as a whole step
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Launch(_) | Self::Navigation(_) | Self::Timeout(_) | Self::Protocol(_)
        )
    }

    /// Failures caused by the list re-rendering under the cursor
    pub fn is_per_item(&self) -> bool {
        matches!(self, Self::StaleElement | Self::ClickIntercepted(_))
    }
}

/// Result type for browser operations
pub type DriverResult<T> = Result<T, DriverError>;

/// How to locate elements in the current document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

/// Launch options for a browser session
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub disable_images: bool,
    pub page_load_timeout: Duration,
    pub executable: Option<PathBuf>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            disable_images: true,
            page_load_timeout: Duration::from_secs(60),
            executable: None,
        }
    }
}

/// A live browser session with one active page
#[async_trait]
pub trait Browser: Send + Sync {
    /// Handle to an element of the current document
    type Element: Send + Sync;

    /// Loads `url` in the active page
    async fn goto(&self, url: &str) -> DriverResult<()>;

    /// URL of the active page
    async fn current_url(&self) -> DriverResult<String>;

    /// All elements matching `locator`, in document order
    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Self::Element>>;

    /// Descendants of `parent` matching a CSS selector
    async fn find_children(
        &self,
        parent: &Self::Element,
        css: &str,
    ) -> DriverResult<Vec<Self::Element>>;

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &Self::Element) -> DriverResult<bool>;

    /// Clicks the element like a user would
    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    /// Dispatches a click from script, bypassing overlays
    async fn script_click(&self, element: &Self::Element) -> DriverResult<()>;

    /// Rendered text of the element, trimmed
    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str)
        -> DriverResult<Option<String>>;

    /// Clears an input and types `text` into it
    async fn clear_and_type(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    /// Sends the default-submit key to the element
    async fn press_enter(&self, element: &Self::Element) -> DriverResult<()>;

    async fn outer_html(&self, element: &Self::Element) -> DriverResult<String>;

    /// Sets the vertical scroll offset of a scrollable element
    async fn set_scroll_top(&self, element: &Self::Element, offset: f64) -> DriverResult<()>;

    /// Scrolls a scrollable element down by `delta` pixels
    async fn scroll_by(&self, element: &Self::Element, delta: f64) -> DriverResult<()>;

    /// Current vertical scroll offset of a scrollable element
    async fn scroll_top(&self, element: &Self::Element) -> DriverResult<f64>;

    /// Ends the session; the browser process is gone afterwards
    ///
    /// Implementations must also end the session when dropped without
    /// `quit`, since a run can be abandoned at any await point.
    async fn quit(&mut self) -> DriverResult<()>;
}

/// Starts browser sessions
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Browser: Browser;

    async fn launch(&self, options: &BrowserOptions) -> DriverResult<Self::Browser>;
}
