use crate::output::OutputFormat;
use crate::retry::RetryConfig;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the extractor
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timing: Timings,
}

/// Which application and project to extract
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Entry URL of the eVIEW application
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Project number as shown in the project list
    #[serde(rename = "project-id", default)]
    pub project_id: String,

    /// Run the browser without a window
    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Sign-in credentials
#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    /// Microsoft account email
    pub email: String,

    /// Account password; may also come from the environment
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    #[serde(rename = "window-width")]
    pub window_width: u32,

    #[serde(rename = "window-height")]
    pub window_height: u32,

    /// Skip image loading to speed up page loads
    #[serde(rename = "disable-images")]
    pub disable_images: bool,

    /// Page load timeout (seconds)
    #[serde(rename = "page-load-timeout-secs")]
    pub page_load_timeout_secs: u64,

    /// Chrome binary to use instead of auto-detection
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            window_width: 1920,
            window_height: 1080,
            disable_images: true,
            page_load_timeout_secs: 60,
            executable: None,
        }
    }
}

/// Retry limits for network-facing steps
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Retries after the first attempt for driver start
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Retries after the first attempt for the SSO redirect
    #[serde(rename = "sso-max-retries")]
    pub sso_max_retries: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Upper bound for any single delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            sso_max_retries: 2,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
        }
    }
}

/// Page cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Path to the JSON cache file
    pub path: PathBuf,

    /// Entry lifetime (hours)
    #[serde(rename = "ttl-hours")]
    pub ttl_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from(crate::cache::DEFAULT_CACHE_FILE),
            ttl_hours: crate::cache::DEFAULT_TTL_HOURS,
        }
    }
}

/// Result file settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output file; defaults to "<project> IO-List.<ext>"
    pub path: Option<PathBuf>,

    pub format: OutputFormat,
}

/// Log file settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory-qualified file name for a daily rolling log
    pub file: Option<PathBuf>,
}

/// Settle and poll waits of the navigation and extraction steps
///
/// Durations are milliseconds. The defaults match the pacing the eVIEW
/// frontend needs to finish its transitions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Polls for the SSO button per attempt
    #[serde(rename = "sso-poll-attempts")]
    pub sso_poll_attempts: u32,

    /// Interval between polls of any kind
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Polls when waiting for a login form field
    #[serde(rename = "element-wait-attempts")]
    pub element_wait_attempts: u32,

    /// Wait after submitting the email or the password
    #[serde(rename = "post-submit-ms")]
    pub post_submit_ms: u64,

    /// Polls for the "stay signed in" prompt
    #[serde(rename = "stay-signed-in-attempts")]
    pub stay_signed_in_attempts: u32,

    /// Wait after the login flow before checking the URL
    #[serde(rename = "post-login-ms")]
    pub post_login_ms: u64,

    /// Wait for the project list to render
    #[serde(rename = "project-list-settle-ms")]
    pub project_list_settle_ms: u64,

    /// Wait after selecting the project row
    #[serde(rename = "project-click-settle-ms")]
    pub project_click_settle_ms: u64,

    /// Wait after opening the project
    #[serde(rename = "project-open-settle-ms")]
    pub project_open_settle_ms: u64,

    /// Wait after opening the page menu
    #[serde(rename = "menu-settle-ms")]
    pub menu_settle_ms: u64,

    /// Wait before and after clicking a list item
    #[serde(rename = "item-settle-ms")]
    pub item_settle_ms: u64,

    /// Pixels scrolled per iteration
    #[serde(rename = "scroll-step-px")]
    pub scroll_step_px: f64,

    /// Wait after each scroll step
    #[serde(rename = "scroll-settle-ms")]
    pub scroll_settle_ms: u64,

    /// Wait after resetting the list to the top
    #[serde(rename = "scroll-reset-settle-ms")]
    pub scroll_reset_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            sso_poll_attempts: 15,
            poll_interval_ms: 1000,
            element_wait_attempts: 15,
            post_submit_ms: 3000,
            stay_signed_in_attempts: 10,
            post_login_ms: 5000,
            project_list_settle_ms: 3000,
            project_click_settle_ms: 500,
            project_open_settle_ms: 5000,
            menu_settle_ms: 500,
            item_settle_ms: 500,
            scroll_step_px: 400.0,
            scroll_settle_ms: 200,
            scroll_reset_settle_ms: 500,
        }
    }
}

impl Timings {
    /// Timings with every wait at zero, for driving an in-memory page model
    pub fn immediate() -> Self {
        Self {
            poll_interval_ms: 0,
            post_submit_ms: 0,
            post_login_ms: 0,
            project_list_settle_ms: 0,
            project_click_settle_ms: 0,
            project_open_settle_ms: 0,
            menu_settle_ms: 0,
            item_settle_ms: 0,
            scroll_settle_ms: 0,
            scroll_reset_settle_ms: 0,
            ..Self::default()
        }
    }
}

fn default_base_url() -> String {
    "https://eview.eplan.com/".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Launch options derived from `[target]` and `[browser]`
    pub fn browser_options(&self) -> crate::driver::BrowserOptions {
        crate::driver::BrowserOptions {
            headless: self.target.headless,
            window_width: self.browser.window_width,
            window_height: self.browser.window_height,
            disable_images: self.browser.disable_images,
            page_load_timeout: Duration::from_secs(self.browser.page_load_timeout_secs),
            executable: self.browser.executable.clone(),
        }
    }
}

impl RetrySettings {
    /// Policy for driver start and other transport-bound steps
    pub fn step_policy(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    /// Policy for the SSO redirect step
    pub fn sso_policy(&self) -> RetryConfig {
        self.step_policy().with_max_retries(self.sso_max_retries)
    }
}
