use crate::config::types::{BrowserConfig, CacheConfig, Config, RetrySettings, TargetConfig, Timings};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// The project id is not checked here because the command line may still
/// supply it; see [`validate_project_id`].
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_target_config(&config.target)?;
    validate_email(&config.credentials.email)?;
    validate_browser_config(&config.browser)?;
    validate_retry_settings(&config.retry)?;
    validate_cache_config(&config.cache)?;
    validate_timings(&config.timing)?;
    Ok(())
}

/// Validates target configuration
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates a project id as it appears in the project list
pub fn validate_project_id(project_id: &str) -> Result<(), ConfigError> {
    if project_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "project-id cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.window_width == 0 || config.window_height == 0 {
        return Err(ConfigError::Validation(format!(
            "window size must be non-zero, got {}x{}",
            config.window_width, config.window_height
        )));
    }

    if config.page_load_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "page-load-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry settings
fn validate_retry_settings(config: &RetrySettings) -> Result<(), ConfigError> {
    if config.max_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "max-delay-ms ({}) must be >= base-delay-ms ({})",
            config.max_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.ttl_hours < 1 {
        return Err(ConfigError::Validation(format!(
            "ttl-hours must be >= 1, got {}",
            config.ttl_hours
        )));
    }

    if config.enabled && config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates timing configuration
fn validate_timings(config: &Timings) -> Result<(), ConfigError> {
    for (name, value) in [
        ("sso-poll-attempts", config.sso_poll_attempts),
        ("element-wait-attempts", config.element_wait_attempts),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.scroll_step_px.is_nan() || config.scroll_step_px <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "scroll-step-px must be > 0, got {}",
            config.scroll_step_px
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
