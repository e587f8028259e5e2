//! Configuration module for the extractor
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use eview_extractor::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("eview.toml")).unwrap();
//! println!("Extracting project: {}", config.target.project_id);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, CacheConfig, Config, CredentialsConfig, LoggingConfig, OutputConfig,
    RetrySettings, TargetConfig, Timings,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, validate_project_id};
