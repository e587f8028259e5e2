//! Chrome implementation of the browser seam, over the DevTools protocol

use crate::driver::{Browser, BrowserLauncher, BrowserOptions, DriverError, DriverResult, Locator};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser as CdpBrowser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Launches local Chrome/Chromium sessions
///
/// The binary is auto-detected unless `BrowserOptions::executable` names one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }

    fn build_config(&self, options: &BrowserOptions) -> DriverResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window_width, options.window_height)
            .request_timeout(options.page_load_timeout)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-infobars");

        if !options.headless {
            builder = builder.with_head();
        }

        if options.disable_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }

        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(DriverError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    type Browser = ChromeBrowser;

    async fn launch(&self, options: &BrowserOptions) -> DriverResult<ChromeBrowser> {
        tracing::debug!(
            "Launching Chrome (headless: {}, {}x{})",
            options.headless,
            options.window_width,
            options.window_height
        );

        let config = self.build_config(options)?;
        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };

        Ok(ChromeBrowser {
            browser,
            page,
            handler_task,
        })
    }
}

/// A running Chrome session with one page
pub struct ChromeBrowser {
    browser: CdpBrowser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromeBrowser {
    async fn call_js(
        &self,
        element: &Element,
        function: &str,
    ) -> DriverResult<Option<serde_json::Value>> {
        let returns = element
            .call_js_fn(function, false)
            .await
            .map_err(map_cdp_error)?;
        Ok(returns.result.value)
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    type Element = Element;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.page.goto(url).await.map_err(|e| match e {
            CdpError::Timeout => DriverError::Timeout(format!("loading {}", url)),
            other => DriverError::Navigation(format!("{}: {}", url, other)),
        })?;
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        let url = self.page.url().await.map_err(map_cdp_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        let found = match locator {
            Locator::Css(selector) => self.page.find_elements(selector.as_str()).await,
            Locator::XPath(expression) => self.page.find_xpaths(expression.as_str()).await,
        };

        match found {
            Ok(elements) => Ok(elements),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(map_cdp_error(e)),
        }
    }

    async fn find_children(&self, parent: &Element, css: &str) -> DriverResult<Vec<Element>> {
        match parent.find_elements(css).await {
            Ok(elements) => Ok(elements),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(map_cdp_error(e)),
        }
    }

    async fn is_displayed(&self, element: &Element) -> DriverResult<bool> {
        let value = self
            .call_js(
                element,
                "function() { \
                    const rect = this.getBoundingClientRect(); \
                    const style = window.getComputedStyle(this); \
                    return rect.width > 0 && rect.height > 0 \
                        && style.visibility !== 'hidden' && style.display !== 'none'; \
                }",
            )
            .await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn is_enabled(&self, element: &Element) -> DriverResult<bool> {
        let value = self
            .call_js(element, "function() { return !this.disabled; }")
            .await?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(true))
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        element.click().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn script_click(&self, element: &Element) -> DriverResult<()> {
        self.call_js(element, "function() { this.click(); }").await?;
        Ok(())
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        let text = element.inner_text().await.map_err(map_cdp_error)?;
        Ok(text.map(|t| t.trim().to_string()).unwrap_or_default())
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        element.attribute(name).await.map_err(map_cdp_error)
    }

    async fn clear_and_type(&self, element: &Element, text: &str) -> DriverResult<()> {
        self.call_js(element, "function() { this.value = ''; this.focus(); }")
            .await?;
        element.type_str(text).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn press_enter(&self, element: &Element) -> DriverResult<()> {
        element.press_key("Enter").await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn outer_html(&self, element: &Element) -> DriverResult<String> {
        let html = element.outer_html().await.map_err(map_cdp_error)?;
        Ok(html.unwrap_or_default())
    }

    async fn set_scroll_top(&self, element: &Element, offset: f64) -> DriverResult<()> {
        let function = format!("function() {{ this.scrollTop = {}; }}", offset);
        self.call_js(element, &function).await?;
        Ok(())
    }

    async fn scroll_by(&self, element: &Element, delta: f64) -> DriverResult<()> {
        let function = format!("function() {{ this.scrollTop += {}; }}", delta);
        self.call_js(element, &function).await?;
        Ok(())
    }

    async fn scroll_top(&self, element: &Element) -> DriverResult<f64> {
        let value = self
            .call_js(element, "function() { return this.scrollTop; }")
            .await?;
        value
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DriverError::Script("scrollTop is not a number".to_string()))
    }

    async fn quit(&mut self) -> DriverResult<()> {
        let closed = self.browser.close().await.map_err(map_cdp_error);
        let waited = self
            .browser
            .wait()
            .await
            .map_err(|e| DriverError::Protocol(e.to_string()));
        self.handler_task.abort();
        closed?;
        waited?;
        Ok(())
    }
}

/// chromiumoxide kills the child process when its `Browser` is dropped
/// unclosed; only the event handler task is left to stop here.
impl Drop for ChromeBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Maps DevTools errors onto the driver taxonomy
fn map_cdp_error(error: CdpError) -> DriverError {
    match error {
        CdpError::Timeout => DriverError::Timeout("browser did not respond".to_string()),
        CdpError::NotFound => DriverError::NoSuchElement("element not found".to_string()),
        CdpError::ScrollingFailed(message) => DriverError::ClickIntercepted(message),
        other => classify_message(other.to_string()),
    }
}

/// Chrome reports detached nodes only through its error text
fn classify_message(message: String) -> DriverError {
    let lower = message.to_lowercase();
    if lower.contains("node with given id")
        || lower.contains("cannot find context with specified id")
        || lower.contains("detached")
    {
        DriverError::StaleElement
    } else {
        DriverError::Protocol(message)
    }
}
