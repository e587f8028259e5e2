//! Extraction session
//!
//! `ExtractionSession` owns the collaborators of a run (browser launcher,
//! cache, logger) and composes driver start, sign-in, project navigation
//! and the scroll extraction into one sequence. Front-ends follow progress
//! through a `RunState` watch channel and stop a run through a `StopHandle`.

use crate::cache::CacheStore;
use crate::config::{Config, Timings};
use crate::driver::{Browser, BrowserLauncher, BrowserOptions};
use crate::extraction::{ExtractionResult, PageRecord, ScrollExtraction};
use crate::logger::Logger;
use crate::navigation::{Navigator, StepOutcome};
use crate::parser::AddressParser;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::{ExtractorError, Result};
use secrecy::{ExposeSecret, SecretBox};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Progress of an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    // ===== Active States =====
    /// No run has started yet
    Idle,

    /// Browser is being launched
    DriverStarting,

    /// Waiting for the landing page to hand over to the SSO provider
    AwaitingLoginRedirect,

    /// Filling the SSO sign-in form
    Authenticating,

    /// Selecting and opening the target project
    OpeningProject,

    /// Switching the page browser to list view
    SwitchingView,

    /// Walking the page list
    Extracting,

    // ===== Terminal States =====
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    /// Returns true once a run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if a run may move from `self` to `next`
    ///
    /// Active states advance strictly in order. Any active state may end in
    /// `Failed` or `Cancelled`; only `Extracting` may end in `Completed`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }

        match next {
            Self::Failed | Self::Cancelled => true,
            _ => self.successor() == Some(next),
        }
    }

    fn successor(&self) -> Option<RunState> {
        match self {
            Self::Idle => Some(Self::DriverStarting),
            Self::DriverStarting => Some(Self::AwaitingLoginRedirect),
            Self::AwaitingLoginRedirect => Some(Self::Authenticating),
            Self::Authenticating => Some(Self::OpeningProject),
            Self::OpeningProject => Some(Self::SwitchingView),
            Self::SwitchingView => Some(Self::Extracting),
            Self::Extracting => Some(Self::Completed),
            Self::Completed | Self::Failed | Self::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DriverStarting => "driver_starting",
            Self::AwaitingLoginRedirect => "awaiting_login_redirect",
            Self::Authenticating => "authenticating",
            Self::OpeningProject => "opening_project",
            Self::SwitchingView => "switching_view",
            Self::Extracting => "extracting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sign-in credentials; the password never appears in `Debug` output
pub struct CredentialSet {
    pub email: String,
    pub password: SecretBox<str>,
}

impl CredentialSet {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretBox::new(Box::from(password.into().as_str())),
        }
    }
}

impl Clone for CredentialSet {
    fn clone(&self) -> Self {
        Self::new(self.email.clone(), self.password.expose_secret())
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// What a run extracts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    pub project_id: String,
    pub headless: bool,
}

impl ExtractionTarget {
    pub fn new(project_id: impl Into<String>, headless: bool) -> Self {
        Self {
            project_id: project_id.into(),
            headless,
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed { pages: usize, entries: usize },
    Failed { cause: ExtractorError },
    /// Stopped on request; the report still carries every finished page
    Cancelled,
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub result: ExtractionResult,
    pub final_state: RunState,
}

impl RunReport {
    fn failed(cause: ExtractorError, final_state: RunState) -> Self {
        Self {
            outcome: RunOutcome::Failed { cause },
            result: ExtractionResult::default(),
            final_state,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled)
    }
}

/// Requests a cooperative stop of the session's in-flight run
#[derive(Clone)]
pub struct StopHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

/// Run parameters taken from the configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub base_url: String,
    pub browser: BrowserOptions,
    pub retry: RetryConfig,
    pub sso_retry: RetryConfig,
    pub timings: Timings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://eview.eplan.com/".to_string(),
            browser: BrowserOptions::default(),
            retry: RetryConfig::default(),
            sso_retry: RetryConfig::default().with_max_retries(2),
            timings: Timings::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.target.base_url.clone(),
            browser: config.browser_options(),
            retry: config.retry.step_policy(),
            sso_retry: config.retry.sso_policy(),
            timings: config.timing.clone(),
        }
    }
}

/// Tracks and publishes the state of one run
struct RunTracker<'s> {
    current: RunState,
    sender: &'s watch::Sender<RunState>,
    logger: &'s dyn Logger,
}

impl<'s> RunTracker<'s> {
    fn start(sender: &'s watch::Sender<RunState>, logger: &'s dyn Logger) -> Self {
        sender.send_replace(RunState::Idle);
        Self {
            current: RunState::Idle,
            sender,
            logger,
        }
    }

    fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.current.can_transition_to(next) {
            return Err(ExtractorError::InvalidTransition {
                from: self.current,
                to: next,
            });
        }

        self.logger
            .debug(&format!("State: {} -> {}", self.current, next));
        self.current = next;
        self.sender.send_replace(next);
        Ok(())
    }
}

/// Releases the session when a run ends, however it ends
///
/// A run whose future is dropped before it finished never publishes a
/// terminal state itself; the release publishes `Cancelled` for it.
struct RunRelease<'s> {
    running: &'s AtomicBool,
    state: &'s watch::Sender<RunState>,
    cancel: CancellationToken,
}

impl Drop for RunRelease<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let finished = self.state.borrow().is_terminal();
        if !finished {
            self.state.send_replace(RunState::Cancelled);
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Orchestrates extraction runs against one browser launcher
pub struct ExtractionSession<L: BrowserLauncher> {
    settings: SessionSettings,
    launcher: L,
    cache: Arc<dyn CacheStore>,
    logger: Arc<dyn Logger>,
    parser: AddressParser,
    state: watch::Sender<RunState>,
    running: AtomicBool,
    current: Arc<Mutex<CancellationToken>>,
}

impl<L: BrowserLauncher> ExtractionSession<L> {
    pub fn new(
        settings: SessionSettings,
        launcher: L,
        cache: Arc<dyn CacheStore>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            settings,
            launcher,
            cache,
            logger,
            parser: AddressParser::new(),
            state,
            running: AtomicBool::new(false),
            current: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Handle that stops whichever run is in flight when it is used
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            current: Arc::clone(&self.current),
        }
    }

    /// Requests a stop of the in-flight run
    pub fn stop(&self) {
        self.logger.info("Stop requested...");
        self.stop_handle().stop();
    }

    /// Receiver of every state change
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Latest published state
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one full extraction
    ///
    /// Never returns an error: every ending is described by the report. A
    /// run started while another one is in flight fails with
    /// `AlreadyRunning` and leaves the other run untouched.
    ///
    /// Dropping the returned future mid-run ends the run as `Cancelled`: the
    /// session is released and the browser is dropped, which ends it.
    pub async fn run(&self, credentials: &CredentialSet, target: &ExtractionTarget) -> RunReport {
        if self.running.swap(true, Ordering::SeqCst) {
            self.logger.error("Extraction already in progress");
            return RunReport::failed(ExtractorError::AlreadyRunning, RunState::Failed);
        }

        let cancel = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();
        let _release = RunRelease {
            running: &self.running,
            state: &self.state,
            cancel: cancel.clone(),
        };

        let mut tracker = RunTracker::start(&self.state, self.logger.as_ref());
        let mut pages: Vec<PageRecord> = Vec::new();

        self.logger.info(&format!(
            "Starting extraction for project: {}",
            target.project_id
        ));
        let driven = self
            .drive(credentials, target, &cancel, &mut tracker, &mut pages)
            .await;

        let result = ExtractionResult::from_pages(&pages);
        let (outcome, final_state) = match driven {
            Ok(()) => {
                self.logger.success(&format!(
                    "Extraction complete: {} variables from {} pages ({} cached)",
                    result.len(),
                    result.pages_total(),
                    result.pages_from_cache()
                ));
                let outcome = RunOutcome::Completed {
                    pages: result.pages_total(),
                    entries: result.len(),
                };
                (outcome, RunState::Completed)
            }
            Err(e) if e.is_cancelled() => {
                self.logger.warning(&format!(
                    "Extraction cancelled; keeping {} pages",
                    result.pages_total()
                ));
                (RunOutcome::Cancelled, RunState::Cancelled)
            }
            Err(e) => {
                self.logger.error(&format!("Extraction failed: {}", e));
                (RunOutcome::Failed { cause: e }, RunState::Failed)
            }
        };

        if let Err(e) = tracker.advance(final_state) {
            self.logger.debug(&e.to_string());
        }

        RunReport {
            outcome,
            result,
            final_state,
        }
    }

    /// Starts the browser, drives it and always tears it down
    async fn drive(
        &self,
        credentials: &CredentialSet,
        target: &ExtractionTarget,
        cancel: &CancellationToken,
        tracker: &mut RunTracker<'_>,
        pages: &mut Vec<PageRecord>,
    ) -> Result<()> {
        tracker.advance(RunState::DriverStarting)?;
        crate::wait::ensure_active(cancel)?;

        let options = BrowserOptions {
            headless: target.headless,
            ..self.settings.browser.clone()
        };
        let policy = RetryPolicy::new(self.settings.retry, Arc::clone(&self.logger))
            .with_cancellation(cancel.clone());

        self.logger.info("Starting WebDriver...");
        let launcher = &self.launcher;
        let options = &options;
        let mut browser = policy
            .execute("driver start", ExtractorError::is_transient, move || async move {
                launcher.launch(options).await.map_err(ExtractorError::from)
            })
            .await
            .map_err(|e| ExtractorError::from_retry("driver start", e))?;
        self.logger.success("WebDriver started successfully");

        let driven = self
            .navigate_and_extract(&browser, credentials, target, cancel, tracker, pages)
            .await;

        match browser.quit().await {
            Ok(()) => self.logger.info("WebDriver closed"),
            Err(e) => self
                .logger
                .warning(&format!("Error closing WebDriver: {}", e)),
        }

        driven
    }

    async fn navigate_and_extract(
        &self,
        browser: &L::Browser,
        credentials: &CredentialSet,
        target: &ExtractionTarget,
        cancel: &CancellationToken,
        tracker: &mut RunTracker<'_>,
        pages: &mut Vec<PageRecord>,
    ) -> Result<()> {
        let timings = &self.settings.timings;
        let base_url = self.settings.base_url.as_str();
        let navigator = Navigator::new(browser, self.logger.as_ref(), timings, cancel);

        tracker.advance(RunState::AwaitingLoginRedirect)?;
        let sso = RetryPolicy::new(self.settings.sso_retry, Arc::clone(&self.logger))
            .with_cancellation(cancel.clone());
        let nav = &navigator;
        sso.execute(
            "SSO redirect",
            |e: &ExtractorError| {
                e.is_transient() || matches!(e, ExtractorError::SsoButtonNotFound { .. })
            },
            move || async move { nav.open_sso_login(base_url).await.into_result() },
        )
        .await
        .map_err(|e| ExtractorError::from_retry("SSO redirect", e))?;

        tracker.advance(RunState::Authenticating)?;
        self.settle_step("login", navigator.authenticate(credentials, base_url).await)?;

        tracker.advance(RunState::OpeningProject)?;
        self.settle_step("project", navigator.open_project(&target.project_id).await)?;

        tracker.advance(RunState::SwitchingView)?;
        self.settle_step("list view", navigator.switch_to_list_view().await)?;

        tracker.advance(RunState::Extracting)?;
        ScrollExtraction::new(
            browser,
            self.cache.as_ref(),
            &self.parser,
            self.logger.as_ref(),
            timings,
            cancel,
            &target.project_id,
        )
        .run(pages)
        .await
    }

    fn settle_step(&self, step: &str, outcome: StepOutcome<()>) -> Result<()> {
        match outcome {
            StepOutcome::Ok(()) => Ok(()),
            StepOutcome::Skip(reason) => {
                self.logger
                    .warning(&format!("Skipping {} step: {}", step, reason));
                Ok(())
            }
            StepOutcome::Fatal(e) => Err(e),
        }
    }
}

impl<L: BrowserLauncher + 'static> ExtractionSession<L> {
    /// Runs the session on a dedicated thread with its own runtime
    ///
    /// The browser session lives entirely on that thread; callers keep the
    /// `Arc` to stop the run or watch its state.
    pub fn spawn_worker(
        self: Arc<Self>,
        credentials: CredentialSet,
        target: ExtractionTarget,
    ) -> std::io::Result<JoinHandle<RunReport>> {
        std::thread::Builder::new()
            .name("eview-extraction".to_string())
            .spawn(move || {
                match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime.block_on(self.run(&credentials, &target)),
                    Err(e) => RunReport::failed(ExtractorError::Io(e), RunState::Failed),
                }
            })
    }
}
