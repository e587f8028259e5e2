//! Scroll-driven page extraction
//!
//! The page list is a virtualized scroll viewport: only the items near the
//! viewport exist in the DOM. The loop reads whatever items are realized,
//! visits the unprocessed diagram pages among them, scrolls one step and
//! repeats until the scroll offset stops moving.

use crate::cache::CacheStore;
use crate::config::Timings;
use crate::driver::{Browser, DriverError, Locator};
use crate::extraction::markup::{self, DIAGRAM_BODY_CLASS};
use crate::extraction::result::{PageRecord, PageSource};
use crate::logger::Logger;
use crate::parser::AddressParser;
use crate::wait;
use crate::{ExtractorError, Result};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Virtualized viewport holding the page list
pub const SCROLL_CONTAINER: &str = "cdk-virtual-scroll-viewport";

/// One entry of the page list
pub const PAGE_ITEM: &str = "pv-page-list-item";

/// Text of the page-type label on PLC diagram items
pub const DIAGRAM_TYPE_MARKER: &str = "PLC-Diagram";

/// Attribute carrying the stable page name
pub const PAGE_NAME_ATTRIBUTE: &str = "data-name";

/// Walks the page list of an opened project
pub struct ScrollExtraction<'a, B: Browser> {
    browser: &'a B,
    cache: &'a dyn CacheStore,
    parser: &'a AddressParser,
    logger: &'a dyn Logger,
    timings: &'a Timings,
    cancel: &'a CancellationToken,
    project_id: &'a str,
}

impl<'a, B: Browser> ScrollExtraction<'a, B> {
    pub fn new(
        browser: &'a B,
        cache: &'a dyn CacheStore,
        parser: &'a AddressParser,
        logger: &'a dyn Logger,
        timings: &'a Timings,
        cancel: &'a CancellationToken,
        project_id: &'a str,
    ) -> Self {
        Self {
            browser,
            cache,
            parser,
            logger,
            timings,
            cancel,
            project_id,
        }
    }

    async fn settle(&self, millis: u64) -> Result<()> {
        wait::pause(self.cancel, Duration::from_millis(millis)).await
    }

    /// Extracts every reachable diagram page into `pages`
    ///
    /// Pages are appended in the order the list realizes them. On
    /// cancellation this returns `Err(Cancelled)` and `pages` holds every
    /// page finished before the stop.
    pub async fn run(&self, pages: &mut Vec<PageRecord>) -> Result<()> {
        let container = self
            .browser
            .find_all(&Locator::css(SCROLL_CONTAINER))
            .await?
            .into_iter()
            .next()
            .ok_or(ExtractorError::ScrollContainerMissing)?;

        self.browser.set_scroll_top(&container, 0.0).await?;
        self.settle(self.timings.scroll_reset_settle_ms).await?;

        let items = Locator::css(PAGE_ITEM);
        let mut processed: HashSet<String> = HashSet::new();
        let mut last_offset: Option<f64> = None;

        loop {
            wait::ensure_active(self.cancel)?;

            let realized = self.browser.find_all(&items).await?.len();
            for index in 0..realized {
                wait::ensure_active(self.cancel)?;

                match self.visit(index, &mut processed).await {
                    Ok(Some(record)) => pages.push(record),
                    Ok(None) => {}
                    Err(ExtractorError::Cancelled) => return Err(ExtractorError::Cancelled),
                    Err(ExtractorError::Driver(e)) if e.is_per_item() => {
                        self.logger.warning(match e {
                            DriverError::StaleElement => "Element stale, continuing...",
                            _ => "Click intercepted, skipping...",
                        });
                    }
                    Err(e) => {
                        self.logger.debug(&format!("Error processing page: {}", e));
                    }
                }
            }

            self.browser
                .scroll_by(&container, self.timings.scroll_step_px)
                .await?;
            self.settle(self.timings.scroll_settle_ms).await?;

            let offset = self.browser.scroll_top(&container).await?;
            if last_offset == Some(offset) {
                break;
            }
            last_offset = Some(offset);
        }

        self.logger
            .info(&format!("Total pages extracted: {}", processed.len()));
        Ok(())
    }

    /// Visits the realized item at `index`
    ///
    /// The item list is re-read on every visit because clicking re-renders
    /// the viewport and invalidates earlier handles.
    async fn visit(
        &self,
        index: usize,
        processed: &mut HashSet<String>,
    ) -> Result<Option<PageRecord>> {
        let Some(item) = self
            .browser
            .find_all(&Locator::css(PAGE_ITEM))
            .await?
            .into_iter()
            .nth(index)
        else {
            return Ok(None);
        };

        if !self.is_diagram(&item).await? {
            return Ok(None);
        }

        let name = match self.browser.attribute(&item, PAGE_NAME_ATTRIBUTE).await? {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };
        if processed.contains(&name) {
            return Ok(None);
        }

        if let Some(data) = self.cache.get(self.project_id, &name) {
            self.logger
                .info(&format!("Using cached data for: {}", name));
            processed.insert(name.clone());
            return Ok(Some(PageRecord::new(name, data, PageSource::Cache)));
        }

        self.logger.info(&format!("Extracting page: {}", name));
        self.settle(self.timings.item_settle_ms).await?;
        self.browser.click(&item).await?;
        self.settle(self.timings.item_settle_ms).await?;

        let data = self.read_diagram().await?;
        processed.insert(name.clone());

        if !data.is_empty() {
            self.logger
                .success(&format!("Extracted {} variables", data.len()));
            if let Err(e) = self.cache.set(self.project_id, &name, &data) {
                self.logger
                    .warning(&format!("Failed to cache {}: {}", name, e));
            }
        }

        self.logger.success(&format!("Extracted: {}", name));
        Ok(Some(PageRecord::new(name, data, PageSource::Live)))
    }

    async fn is_diagram(&self, item: &B::Element) -> Result<bool> {
        for child in self.browser.find_children(item, "div").await? {
            if self.browser.text(&child).await?.contains(DIAGRAM_TYPE_MARKER) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parses the diagram currently shown in the detail panel
    async fn read_diagram(&self) -> Result<crate::cache::PageData> {
        let bodies = self
            .browser
            .find_all(&Locator::css(format!(".{}", DIAGRAM_BODY_CLASS)))
            .await?;

        let mut html = String::new();
        for body in &bodies {
            html.push_str(&self.browser.outer_html(body).await?);
        }

        Ok(markup::parse_diagram(&html, self.parser))
    }
}
