//! eView extractor main entry point
//!
//! This is the command-line interface for harvesting PLC I/O lists from
//! EPLAN eVIEW projects.

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use eview_extractor::cache::{CacheStore, DisabledCache, JsonFileCache};
use eview_extractor::config::{load_config_with_hash, validate_project_id, Config};
use eview_extractor::driver::ChromeLauncher;
use eview_extractor::logger::{Logger, TracingLogger};
use eview_extractor::output::{self, OutputFormat};
use eview_extractor::session::{
    CredentialSet, ExtractionSession, ExtractionTarget, RunOutcome, SessionSettings,
};
use eview_extractor::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// eView extractor: PLC I/O lists from EPLAN eVIEW
///
/// Signs in through Microsoft SSO, opens a project, walks its PLC diagram
/// pages and writes every address with its variable name to one sorted
/// table. Pages extracted in earlier runs are served from a local cache.
#[derive(Parser, Debug)]
#[command(name = "eview-extractor")]
#[command(version)]
#[command(about = "Extracts PLC I/O lists from EPLAN eVIEW", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Project to extract, overriding [target] project-id
    #[arg(long, value_name = "ID")]
    project: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Output file, overriding [output] path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Output format, overriding [output] format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Account password, overriding [credentials] password
    #[arg(long, env = "EVIEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Validate config and show what would be extracted without starting a browser
    #[arg(long, conflicts_with_all = ["clear_cache", "cleanup_cache"])]
    dry_run: bool,

    /// Remove cached pages (only those of --project if given) and exit
    #[arg(long, conflicts_with_all = ["dry_run", "cleanup_cache"])]
    clear_cache: bool,

    /// Remove expired cache entries and exit
    #[arg(long, conflicts_with_all = ["dry_run", "clear_cache"])]
    cleanup_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    let _guard = setup_logging(cli.verbose, cli.quiet, config.logging.file.as_deref())?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    apply_overrides(&mut config, &cli);
    let logger = Arc::new(TracingLogger::new());

    if cli.clear_cache {
        return handle_clear_cache(&config, cli.project.as_deref(), logger);
    }
    if cli.cleanup_cache {
        return handle_cleanup_cache(&config, logger);
    }

    validate_project_id(&config.target.project_id)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_extraction(config, cli.output, logger).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log file configured, a daily rolling file layer is added next to
/// the console output; the returned guard flushes it on drop.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("eview_extractor=info,warn"),
            1 => EnvFilter::new("eview_extractor=debug,info"),
            2 => EnvFilter::new("eview_extractor=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    let (file_layer, guard) = match file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("[logging] file must name a file")?;
            std::fs::create_dir_all(directory)?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Applies command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(project) = &cli.project {
        config.target.project_id = project.clone();
    }
    if cli.headed {
        config.target.headless = false;
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(password) = &cli.password {
        config.credentials.password = Some(password.clone());
    }
}

fn open_cache(config: &Config, logger: Arc<dyn Logger>) -> Arc<dyn CacheStore> {
    if config.cache.enabled {
        Arc::new(JsonFileCache::open(
            config.cache.path.clone(),
            config.cache.ttl_hours,
            logger,
        ))
    } else {
        Arc::new(DisabledCache)
    }
}

/// Handles the --dry-run mode: validates config and shows what would be extracted
fn handle_dry_run(config: &Config) {
    println!("=== eView Extractor Dry Run ===\n");

    println!("Target:");
    println!("  Base URL: {}", config.target.base_url);
    println!("  Project: {}", config.target.project_id);
    println!("  Headless: {}", config.target.headless);

    println!("\nCredentials:");
    println!("  Email: {}", config.credentials.email);
    println!(
        "  Password: {}",
        if config.credentials.password.is_some() {
            "set"
        } else {
            "missing"
        }
    );

    println!("\nBrowser:");
    println!(
        "  Window: {}x{}",
        config.browser.window_width, config.browser.window_height
    );
    println!("  Images disabled: {}", config.browser.disable_images);

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  SSO max retries: {}", config.retry.sso_max_retries);
    println!(
        "  Backoff: {}ms to {}ms",
        config.retry.base_delay_ms, config.retry.max_delay_ms
    );

    println!("\nCache:");
    if config.cache.enabled {
        println!("  File: {}", config.cache.path.display());
        println!("  TTL: {}h", config.cache.ttl_hours);
    } else {
        println!("  Disabled");
    }

    let output_path = config.output.path.clone().unwrap_or_else(|| {
        output::default_output_path(&config.target.project_id, config.output.format)
    });
    println!("\nOutput:");
    println!("  Format: {}", config.output.format);
    println!("  File: {}", output_path.display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --clear-cache mode
fn handle_clear_cache(
    config: &Config,
    project: Option<&str>,
    logger: Arc<TracingLogger>,
) -> anyhow::Result<()> {
    let cache = open_cache(config, logger.clone());
    let removed = cache.clear(project)?;
    match project {
        Some(project) => logger.info(&format!(
            "Cleared {} cached pages of project {}",
            removed, project
        )),
        None => logger.info(&format!("Cleared {} cached pages", removed)),
    }
    Ok(())
}

/// Handles the --cleanup-cache mode
fn handle_cleanup_cache(config: &Config, logger: Arc<TracingLogger>) -> anyhow::Result<()> {
    let cache = open_cache(config, logger.clone());
    let removed = cache.cleanup_expired()?;
    logger.info(&format!("Removed {} expired cache entries", removed));
    Ok(())
}

/// Runs a full extraction and writes the result
async fn handle_extraction(
    config: Config,
    output_override: Option<PathBuf>,
    logger: Arc<TracingLogger>,
) -> anyhow::Result<()> {
    let password = config
        .credentials
        .password
        .clone()
        .ok_or_else(|| {
            ConfigError::MissingCredential(
                "password (set [credentials] password or EVIEW_PASSWORD)".to_string(),
            )
        })?;
    let credentials = CredentialSet::new(config.credentials.email.clone(), password);
    let target = ExtractionTarget::new(config.target.project_id.clone(), config.target.headless);

    let cache = open_cache(&config, logger.clone());
    match cache.cleanup_expired() {
        Ok(0) => {}
        Ok(removed) => logger.debug(&format!("Removed {} expired cache entries", removed)),
        Err(e) => logger.warning(&format!("Cache cleanup failed: {}", e)),
    }

    let session = Arc::new(ExtractionSession::new(
        SessionSettings::from_config(&config),
        ChromeLauncher::new(),
        cache,
        logger.clone(),
    ));

    // Ctrl-C requests a cooperative stop; the partial result is still written
    let stop = session.stop_handle();
    let interrupt_logger = logger.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_logger.warning("Interrupt received, stopping after the current step...");
            stop.stop();
        }
    });

    // The browser session lives on its own worker thread
    let worker = Arc::clone(&session)
        .spawn_worker(credentials, target.clone())
        .context("Failed to start the extraction worker")?;
    let report = tokio::task::spawn_blocking(move || worker.join())
        .await?
        .map_err(|_| anyhow!("Extraction worker panicked"))?;

    if !report.result.is_empty() {
        let path = output::write_result(
            &report.result,
            &target.project_id,
            config.output.format,
            output_override.as_deref().or(config.output.path.as_deref()),
        )?;
        logger.success(&format!("Results saved to: {}", path.display()));
    }

    match report.outcome {
        RunOutcome::Completed { pages, entries } => {
            logger.success(&format!(
                "Done: {} variables from {} pages",
                entries, pages
            ));
            Ok(())
        }
        RunOutcome::Cancelled => {
            logger.warning(&format!(
                "Stopped early: {} variables from {} pages written",
                report.result.len(),
                report.result.pages_total()
            ));
            Ok(())
        }
        RunOutcome::Failed { cause } => bail!("Extraction failed: {}", cause),
    }
}
