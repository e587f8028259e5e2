//! eView extractor: PLC I/O list harvesting from EPLAN eVIEW
//!
//! This crate drives the eVIEW web application through a Chrome session,
//! signs in through the Microsoft SSO redirect, opens a project and walks its
//! PLC diagram pages, collecting `address -> variable` pairs into one sorted
//! table. Previously extracted pages are served from a TTL-bounded cache.

pub mod cache;
pub mod config;
pub mod driver;
pub mod extraction;
pub mod logger;
pub mod navigation;
pub mod output;
pub mod parser;
pub mod retry;
pub mod session;
pub mod wait;

use thiserror::Error;

/// Main error type for extraction runs
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Driver(#[from] driver::DriverError),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("{step} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        step: String,
        attempts: u32,
        source: Box<ExtractorError>,
    },

    #[error("SSO login button not found after {attempts} attempts")]
    SsoButtonNotFound { attempts: u32 },

    #[error("Email field not found")]
    EmailFieldNotFound,

    #[error("Project '{0}' not found")]
    ProjectNotFound(String),

    #[error("'Open' button not found for project '{0}'")]
    OpenButtonNotFound(String),

    #[error("Scroll container not found")]
    ScrollContainerMissing,

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: session::RunState,
        to: session::RunState,
    },

    #[error("An extraction run is already in progress")]
    AlreadyRunning,

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Returns true if retrying the failed operation may succeed
    ///
    /// Only transport and driver-start failures qualify. Structural absences
    /// (missing project, missing controls) and cancellation never do.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Driver(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error represents a requested stop
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Unwraps the failure of a retried step, tagging exhaustion with the step name
    pub fn from_retry(step: &str, error: retry::RetryError<ExtractorError>) -> Self {
        match error {
            retry::RetryError::NonRetryable(e) => e,
            retry::RetryError::Exhausted { attempts, source } => Self::RetryExhausted {
                step: step.to_string(),
                attempts,
                source: Box::new(source),
            },
            retry::RetryError::Cancelled => Self::Cancelled,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{CacheStore, DisabledCache, JsonFileCache, PageData};
pub use config::Config;
pub use extraction::{AddressPair, ExtractionResult};
pub use logger::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use parser::AddressParser;
pub use retry::{RetryConfig, RetryPolicy};
pub use session::{
    CredentialSet, ExtractionSession, ExtractionTarget, RunOutcome, RunReport, RunState,
    StopHandle,
};
