//! Sign-in and project navigation
//!
//! This module walks the browser from the eVIEW landing page to the page
//! list of an opened project:
//! - `open_sso_login` finds and clicks the Microsoft sign-in entry
//! - `authenticate` fills the Microsoft sign-in form
//! - `open_project` selects and opens the target project
//! - `switch_to_list_view` flips the page browser into list mode
//!
//! Each step reports a [`StepOutcome`]. Retries are applied by the caller,
//! which knows which steps are worth repeating.

mod selectors;

pub use selectors::{
    css_candidates, first_displayed, first_present, is_open_label, next_button_selectors,
    project_locators, stay_signed_in_selectors, xpath_literal, EMAIL_SELECTORS,
    PASSWORD_SELECTORS, SSO_BUTTON_XPATH, SSO_HOST_MARKER, SUBMIT_SELECTORS,
};

use crate::config::Timings;
use crate::driver::{Browser, DriverError, DriverResult, Locator};
use crate::logger::Logger;
use crate::session::CredentialSet;
use crate::wait;
use crate::{ExtractorError, Result};
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result of one navigation step
#[derive(Debug)]
pub enum StepOutcome<T> {
    /// The step did what it was asked to do
    Ok(T),
    /// The step found nothing to do; the run continues
    Skip(String),
    /// The run cannot continue
    Fatal(ExtractorError),
}

impl<T> StepOutcome<T> {
    /// Collapses a fallible step body into an outcome
    pub fn flatten(result: Result<StepOutcome<T>>) -> Self {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Self::Fatal(e),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// `Ok(Some)` for success, `Ok(None)` for a skip, `Err` for a fatal outcome
    pub fn into_result(self) -> Result<Option<T>> {
        match self {
            Self::Ok(value) => Ok(Some(value)),
            Self::Skip(_) => Ok(None),
            Self::Fatal(e) => Err(e),
        }
    }
}

impl<T> From<Result<T>> for StepOutcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Fatal(e),
        }
    }
}

/// Returns true if `url` looks like the application after sign-in
///
/// The URL must not mention "login" and must either start with the base URL
/// or carry the application marker.
pub fn login_looks_successful(url: &str, base_url: &str) -> bool {
    let lower = url.to_lowercase();
    !lower.contains("login")
        && (url.starts_with(base_url) || lower.contains(selectors::APP_URL_MARKER))
}

/// Drives one browser session through the navigation steps
pub struct Navigator<'a, B: Browser> {
    browser: &'a B,
    logger: &'a dyn Logger,
    timings: &'a Timings,
    cancel: &'a CancellationToken,
}

impl<'a, B: Browser> Navigator<'a, B> {
    pub fn new(
        browser: &'a B,
        logger: &'a dyn Logger,
        timings: &'a Timings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            browser,
            logger,
            timings,
            cancel,
        }
    }

    async fn settle(&self, millis: u64) -> Result<()> {
        wait::pause(self.cancel, Duration::from_millis(millis)).await
    }

    /// Clicks an element if it is displayed and enabled
    ///
    /// An intercepted click is retried from script. Returns false when the
    /// element could not be clicked; that is never an error.
    pub async fn click_safely(&self, element: &B::Element) -> bool {
        match self.try_click(element).await {
            Ok(clicked) => clicked,
            Err(DriverError::ClickIntercepted(_)) => {
                self.browser.script_click(element).await.is_ok()
            }
            Err(DriverError::StaleElement) => {
                self.logger.warning("Element became stale");
                false
            }
            Err(e) => {
                self.logger.debug(&format!("Click failed: {}", e));
                false
            }
        }
    }

    async fn try_click(&self, element: &B::Element) -> DriverResult<bool> {
        if self.browser.is_displayed(element).await? && self.browser.is_enabled(element).await? {
            self.browser.click(element).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Polls the candidates until one resolves to a displayed element
    async fn wait_for_displayed(
        &self,
        candidates: &[Locator],
        attempts: u32,
    ) -> Result<Option<B::Element>> {
        for attempt in 1..=attempts {
            wait::ensure_active(self.cancel)?;

            if let Some((index, element)) = first_displayed(self.browser, candidates).await? {
                self.logger.debug(&format!(
                    "Element found with selector: {}",
                    candidates[index].as_str()
                ));
                return Ok(Some(element));
            }

            self.logger
                .debug(&format!("Waiting for element... [{}/{}]", attempt, attempts));
            if attempt < attempts {
                self.settle(self.timings.poll_interval_ms).await?;
            }
        }

        Ok(None)
    }

    /// Clicks a submit control, or presses Enter in `field` if there is none
    async fn submit(&self, field: &B::Element, candidates: &[&str]) -> Result<()> {
        let locators = css_candidates(candidates);
        match self
            .wait_for_displayed(&locators, self.timings.element_wait_attempts)
            .await?
        {
            Some(button) => {
                self.click_safely(&button).await;
            }
            None => self.browser.press_enter(field).await?,
        }
        Ok(())
    }

    /// Opens the base URL and follows the Microsoft sign-in entry
    ///
    /// Polls for an element mentioning the provider, clicks it and checks
    /// that the browser landed on the provider's host.
    pub async fn open_sso_login(&self, base_url: &str) -> StepOutcome<()> {
        StepOutcome::from(self.open_sso_login_inner(base_url).await)
    }

    async fn open_sso_login_inner(&self, base_url: &str) -> Result<()> {
        wait::ensure_active(self.cancel)?;
        self.logger.info(&format!("Navigating to: {}", base_url));
        self.browser.goto(base_url).await?;

        let locator = Locator::xpath(SSO_BUTTON_XPATH);
        let attempts = self.timings.sso_poll_attempts;

        for attempt in 1..=attempts {
            wait::ensure_active(self.cancel)?;
            self.logger.info(&format!(
                "Looking for Microsoft button... [{}/{}]",
                attempt, attempts
            ));

            let elements = match self.browser.find_all(&locator).await {
                Ok(elements) => elements,
                Err(e) if e.is_transient() => return Err(e.into()),
                Err(_) => Vec::new(),
            };

            for element in &elements {
                if !self.click_safely(element).await {
                    continue;
                }
                self.settle(self.timings.poll_interval_ms).await?;

                let url = self.browser.current_url().await?;
                if url.contains(SSO_HOST_MARKER) {
                    self.logger.success("Microsoft login page reached");
                    return Ok(());
                }
            }

            self.settle(self.timings.poll_interval_ms).await?;
        }

        Err(ExtractorError::SsoButtonNotFound { attempts })
    }

    /// Signs in on the Microsoft form
    ///
    /// A missing password field is tolerated (the account may already have
    /// a session). An unclear final URL is reported and treated as success.
    pub async fn authenticate(
        &self,
        credentials: &CredentialSet,
        base_url: &str,
    ) -> StepOutcome<()> {
        StepOutcome::from(self.authenticate_inner(credentials, base_url).await)
    }

    async fn authenticate_inner(&self, credentials: &CredentialSet, base_url: &str) -> Result<()> {
        let attempts = self.timings.element_wait_attempts;

        self.logger.info("Waiting for email field...");
        let email_field = self
            .wait_for_displayed(&css_candidates(EMAIL_SELECTORS), attempts)
            .await?
            .ok_or(ExtractorError::EmailFieldNotFound)?;

        self.logger.info("Entering email...");
        self.browser
            .clear_and_type(&email_field, &credentials.email)
            .await?;

        self.logger.info("Looking for 'Next' button...");
        self.submit(&email_field, next_button_selectors()).await?;
        self.settle(self.timings.post_submit_ms).await?;

        self.logger.info("Looking for password field...");
        match self
            .wait_for_displayed(&css_candidates(PASSWORD_SELECTORS), attempts)
            .await?
        {
            Some(password_field) => {
                self.logger.info("Entering password...");
                self.browser
                    .clear_and_type(&password_field, credentials.password.expose_secret())
                    .await?;

                self.logger.info("Looking for 'Sign-In' button...");
                self.submit(&password_field, SUBMIT_SELECTORS).await?;
            }
            None => self
                .logger
                .warning("Password field not found - SSO may be active"),
        }
        self.settle(self.timings.post_submit_ms).await?;

        self.logger.info("Handling 'Stay signed in' dialog...");
        let stay = css_candidates(stay_signed_in_selectors());
        for _ in 0..self.timings.stay_signed_in_attempts {
            if let Some(button) = self.wait_for_displayed(&stay, 1).await? {
                if self.click_safely(&button).await {
                    self.logger.debug("'Stay logged in' confirmed");
                    break;
                }
            }
            self.settle(self.timings.poll_interval_ms).await?;
        }

        self.settle(self.timings.post_login_ms).await?;

        let url = self.browser.current_url().await?;
        if login_looks_successful(&url, base_url) {
            self.logger.success("Microsoft SSO login successful!");
        } else {
            self.logger
                .warning(&format!("Login status unclear. URL: {}", url));
        }

        Ok(())
    }

    /// Selects the project in the project list and opens it
    pub async fn open_project(&self, project_id: &str) -> StepOutcome<()> {
        StepOutcome::from(self.open_project_inner(project_id).await)
    }

    async fn open_project_inner(&self, project_id: &str) -> Result<()> {
        self.logger
            .info(&format!("Opening project: {}", project_id));
        self.settle(self.timings.project_list_settle_ms).await?;

        let locators = project_locators(project_id);
        let (index, project) = first_present(self.browser, &locators)
            .await?
            .ok_or_else(|| ExtractorError::ProjectNotFound(project_id.to_string()))?;
        self.logger
            .success(&format!("Project found with: {}", locators[index].as_str()));

        self.click_safely(&project).await;
        self.settle(self.timings.project_click_settle_ms).await?;

        self.logger.info("Looking for 'Open' button...");
        let buttons = self.browser.find_all(&Locator::css("button")).await?;
        let mut opened = false;
        for button in &buttons {
            let label = match self.browser.text(button).await {
                Ok(text) => text.to_lowercase(),
                Err(_) => continue,
            };
            if is_open_label(&label) && self.click_safely(button).await {
                self.logger.success("'Open' button clicked");
                opened = true;
                break;
            }
        }

        if !opened {
            return Err(ExtractorError::OpenButtonNotFound(project_id.to_string()));
        }

        self.settle(self.timings.project_open_settle_ms).await?;
        self.logger
            .success(&format!("Project '{}' opened", project_id));
        Ok(())
    }

    /// Switches the page browser from diagram view to list view
    ///
    /// Skips when the menu or its list-view entry is not there.
    pub async fn switch_to_list_view(&self) -> StepOutcome<()> {
        StepOutcome::flatten(self.switch_to_list_view_inner().await)
    }

    async fn switch_to_list_view_inner(&self) -> Result<StepOutcome<()>> {
        wait::ensure_active(self.cancel)?;
        self.logger.info("Looking for menu button...");

        let mut menu_found = false;
        let buttons = self
            .browser
            .find_all(&Locator::css(selectors::MENU_BUTTON_TAG))
            .await?;
        for button in &buttons {
            if !self.browser.is_displayed(button).await.unwrap_or(false) {
                continue;
            }
            let marker = self.attribute_or_empty(button, "data-t").await;
            if !marker.contains(selectors::MENU_BUTTON_MARKER) {
                continue;
            }

            menu_found = true;
            let class = self.attribute_or_empty(button, "class").await;
            if class.contains(selectors::MENU_OPEN_CLASS) {
                self.logger.debug("Menu already open");
            } else if self.click_safely(button).await {
                self.logger.info("Menu button clicked");
            }
            break;
        }

        self.settle(self.timings.menu_settle_ms).await?;

        let items = self
            .browser
            .find_all(&Locator::css(selectors::LIST_VIEW_ITEM_TAG))
            .await?;
        for item in &items {
            if !self.browser.is_displayed(item).await.unwrap_or(false) {
                continue;
            }
            let marker = self.attribute_or_empty(item, "data-name").await;
            if marker.contains(selectors::LIST_VIEW_MARKER) {
                self.click_safely(item).await;
                self.logger.success("Switched to list view");
                return Ok(StepOutcome::Ok(()));
            }
        }

        let reason = if menu_found {
            "list view option not found"
        } else {
            "page menu button not found"
        };
        Ok(StepOutcome::Skip(reason.to_string()))
    }

    async fn attribute_or_empty(&self, element: &B::Element, name: &str) -> String {
        self.browser
            .attribute(element, name)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}
