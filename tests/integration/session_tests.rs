use crate::fake_browser::{numbered_diagrams, FakePage, FakeSite, BASE_URL};
use eview_extractor::cache::{CacheStore, DisabledCache, JsonFileCache};
use eview_extractor::config::Timings;
use eview_extractor::logger::{LogLevel, MemoryLogger};
use eview_extractor::retry::RetryConfig;
use eview_extractor::session::{
    CredentialSet, ExtractionSession, ExtractionTarget, RunOutcome, RunState, SessionSettings,
};
use eview_extractor::ExtractorError;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const PROJECT: &str = "P-1000";

/// Settings with no settle waits and millisecond backoff
fn test_settings() -> SessionSettings {
    let retry = RetryConfig {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    };
    SessionSettings {
        base_url: BASE_URL.to_string(),
        retry,
        sso_retry: retry.with_max_retries(2),
        timings: Timings::immediate(),
        ..SessionSettings::default()
    }
}

fn credentials() -> CredentialSet {
    CredentialSet::new("engineer@example.com", "correct horse")
}

fn target() -> ExtractionTarget {
    ExtractionTarget::new(PROJECT, true)
}

fn session(
    site: &FakeSite,
    cache: Arc<dyn CacheStore>,
) -> (ExtractionSession<crate::fake_browser::FakeLauncher>, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new());
    let session = ExtractionSession::new(test_settings(), site.launcher(), cache, logger.clone());
    (session, logger)
}

fn addresses(report: &eview_extractor::session::RunReport) -> Vec<String> {
    report
        .result
        .iter()
        .map(|pair| pair.address.clone())
        .collect()
}

#[tokio::test]
async fn test_full_run_completes_with_sorted_result() {
    let mut pages = numbered_diagrams(10);
    pages.insert(2, FakePage::cover("=CAB1+DOC/1"));
    let site = FakeSite::new(PROJECT, pages);
    let (session, logger) = session(&site, Arc::new(DisabledCache));
    let mut states = session.subscribe();

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed(), "outcome: {:?}", report.outcome);
    match report.outcome {
        RunOutcome::Completed { pages, entries } => {
            assert_eq!(pages, 10);
            assert_eq!(entries, 20);
        }
        ref other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(report.final_state, RunState::Completed);
    assert_eq!(*states.borrow_and_update(), RunState::Completed);

    let found = addresses(&report);
    let mut sorted = found.clone();
    sorted.sort();
    assert_eq!(found, sorted);
    assert_eq!(found.first().map(String::as_str), Some("I0.0"));
    assert!(found.iter().position(|a| a == "I1.0") < found.iter().position(|a| a == "I2.0"));

    let input_0 = report
        .result
        .iter()
        .find(|pair| pair.address == "I0.0")
        .unwrap();
    assert_eq!(input_0.variable, "Input_0");

    assert_eq!(site.detail_reads(), 10);
    assert_eq!(site.quits(), 1);
    assert_eq!(site.typed(), vec!["engineer@example.com", "correct horse"]);
    assert!(logger.contains(LogLevel::Success, "Microsoft login page reached"));
    assert!(logger.contains(LogLevel::Success, "Microsoft SSO login successful!"));
    assert!(logger.contains(LogLevel::Success, "Switched to list view"));
    assert!(!session.is_running());
}

#[tokio::test]
async fn test_password_is_never_logged() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2));
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed());
    assert!(logger
        .entries()
        .iter()
        .all(|(_, message)| !message.contains("correct horse")));
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("eplan_cache.json");
    let site = FakeSite::new(PROJECT, numbered_diagrams(5));

    let first_cache = Arc::new(JsonFileCache::open(
        cache_path.clone(),
        24,
        Arc::new(MemoryLogger::new()),
    ));
    let (first, _) = session(&site, first_cache);
    let first_report = first.run(&credentials(), &target()).await;
    assert!(first_report.is_completed());
    assert_eq!(first_report.result.pages_from_cache(), 0);
    assert_eq!(site.detail_reads(), 5);

    // A fresh process reads the cache back from disk
    let second_cache = Arc::new(JsonFileCache::open(
        cache_path,
        24,
        Arc::new(MemoryLogger::new()),
    ));
    assert_eq!(second_cache.len(), 5);
    let (second, logger) = session(&site, second_cache);
    let second_report = second.run(&credentials(), &target()).await;

    assert!(second_report.is_completed());
    assert_eq!(second_report.result.pages_from_cache(), 5);
    assert_eq!(site.detail_reads(), 5);
    assert_eq!(second_report.result.entries(), first_report.result.entries());
    assert!(logger.contains(LogLevel::Info, "Using cached data for: =CAB1+PLC/1"));
}

#[tokio::test]
async fn test_missing_password_field_is_tolerated() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3)).without_password_field();
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed());
    assert_eq!(report.result.len(), 6);
    assert!(logger.contains(LogLevel::Warning, "Password field not found"));
    assert_eq!(site.typed(), vec!["engineer@example.com"]);
}

#[tokio::test]
async fn test_unknown_project_fails_without_retry() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3));
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session
        .run(&credentials(), &ExtractionTarget::new("P-404", true))
        .await;

    match &report.outcome {
        RunOutcome::Failed {
            cause: ExtractorError::ProjectNotFound(project),
        } => assert_eq!(project, "P-404"),
        other => panic!("expected ProjectNotFound, got {:?}", other),
    }
    assert_eq!(report.final_state, RunState::Failed);
    assert!(report.result.is_empty());
    assert_eq!(site.launches(), 1);
    assert_eq!(site.quits(), 1);
    assert!(logger.contains(LogLevel::Error, "Project 'P-404' not found"));
}

#[tokio::test]
async fn test_driver_start_is_retried() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2)).failing_launches(2);
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed());
    assert_eq!(site.launches(), 3);
    assert_eq!(logger.count(LogLevel::Warning), 2);
    assert!(logger.contains(LogLevel::Warning, "Attempt 1/4 failed"));
}

#[tokio::test]
async fn test_driver_start_exhaustion_fails_run() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2)).failing_launches(100);
    let (session, _) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    match &report.outcome {
        RunOutcome::Failed {
            cause: ExtractorError::RetryExhausted { step, attempts, .. },
        } => {
            assert_eq!(step, "driver start");
            assert_eq!(*attempts, 4);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(site.launches(), 4);
    assert_eq!(site.quits(), 0);
}

#[tokio::test]
async fn test_missing_sso_button_retries_whole_poll() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2)).without_sso_button();
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    match &report.outcome {
        RunOutcome::Failed {
            cause: ExtractorError::RetryExhausted { step, attempts, .. },
        } => {
            assert_eq!(step, "SSO redirect");
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert!(logger.contains(LogLevel::Info, "Looking for Microsoft button... [15/15]"));
    assert_eq!(site.quits(), 1);
}

#[tokio::test]
async fn test_cancel_after_three_pages_keeps_those_pages() {
    let stop_slot: Arc<Mutex<Option<eview_extractor::session::StopHandle>>> =
        Arc::new(Mutex::new(None));
    let hook_slot = Arc::clone(&stop_slot);
    let site = FakeSite::new(PROJECT, numbered_diagrams(10)).on_detail_read(move |reads| {
        if reads == 3 {
            if let Some(stop) = hook_slot.lock().unwrap().as_ref() {
                stop.stop();
            }
        }
    });
    let (session, _) = session(&site, Arc::new(DisabledCache));
    *stop_slot.lock().unwrap() = Some(session.stop_handle());

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_cancelled(), "outcome: {:?}", report.outcome);
    assert_eq!(report.final_state, RunState::Cancelled);
    assert_eq!(report.result.pages_total(), 3);
    assert_eq!(
        addresses(&report),
        vec!["I0.0", "I1.0", "I2.0", "Q0.1", "Q1.1", "Q2.1"]
    );
    assert_eq!(site.detail_reads(), 3);
    assert_eq!(site.quits(), 1);
}

#[tokio::test]
async fn test_stale_item_is_skipped() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(4));
    site.mark_stale(1);
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed());
    assert_eq!(report.result.pages_total(), 3);
    assert!(!addresses(&report).contains(&"I1.0".to_string()));
    assert!(logger.contains(LogLevel::Warning, "Element stale, continuing..."));
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2)).launch_delay(Duration::from_millis(50));
    let (session, _) = session(&site, Arc::new(DisabledCache));
    let credentials = credentials();
    let target = target();

    let (first, second) = tokio::join!(
        session.run(&credentials, &target),
        session.run(&credentials, &target)
    );

    assert!(first.is_completed());
    assert!(matches!(
        second.outcome,
        RunOutcome::Failed {
            cause: ExtractorError::AlreadyRunning
        }
    ));
    assert_eq!(second.final_state, RunState::Failed);
    assert_eq!(first.final_state, RunState::Completed);
    assert_eq!(site.launches(), 1);
}

#[tokio::test]
async fn test_dropped_run_releases_session() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3))
        .stall_once_on_open(Duration::from_secs(10));
    let (session, _) = session(&site, Arc::new(DisabledCache));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        session.run(&credentials(), &target()),
    )
    .await;

    assert!(abandoned.is_err());
    assert!(!session.is_running());
    assert_eq!(session.state(), RunState::Cancelled);
    assert_eq!(site.quits(), 0);
    assert_eq!(site.dropped_browsers(), 1);

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed(), "outcome: {:?}", report.outcome);
    assert_eq!(report.result.len(), 6);
    assert_eq!(site.launches(), 2);
    assert_eq!(site.dropped_browsers(), 2);
}

#[tokio::test]
async fn test_missing_open_button_fails_run() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3)).without_open_button();
    let (session, _) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    match &report.outcome {
        RunOutcome::Failed {
            cause: ExtractorError::OpenButtonNotFound(project),
        } => assert_eq!(project, PROJECT),
        other => panic!("expected OpenButtonNotFound, got {:?}", other),
    }
    assert_eq!(report.final_state, RunState::Failed);
    assert_eq!(site.launches(), 1);
    assert_eq!(site.quits(), 1);
    assert_eq!(site.detail_reads(), 0);
}

#[tokio::test]
async fn test_missing_page_menu_skips_view_switch() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3)).without_page_menu();
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed(), "outcome: {:?}", report.outcome);
    assert_eq!(report.result.len(), 6);
    assert!(logger.contains(
        LogLevel::Warning,
        "Skipping list view step: page menu button not found"
    ));
    assert!(!logger.contains(LogLevel::Success, "Switched to list view"));
}

#[tokio::test]
async fn test_unclear_login_url_is_reported_and_run_continues() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2))
        .final_url("https://portal.example.net/start");
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed(), "outcome: {:?}", report.outcome);
    assert!(logger.contains(
        LogLevel::Warning,
        "Login status unclear. URL: https://portal.example.net/start"
    ));
    assert!(!logger.contains(LogLevel::Success, "Microsoft SSO login successful!"));
}

#[tokio::test]
async fn test_missing_stay_signed_in_prompt_is_tolerated() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(2)).without_stay_prompt();
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed(), "outcome: {:?}", report.outcome);
    assert_eq!(report.result.len(), 4);
    assert!(!logger.contains(LogLevel::Debug, "'Stay logged in' confirmed"));
    assert!(logger.contains(LogLevel::Success, "Microsoft SSO login successful!"));
}

#[tokio::test]
async fn test_intercepted_item_is_skipped() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(4));
    site.intercept(2);
    let (session, logger) = session(&site, Arc::new(DisabledCache));

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_completed());
    assert_eq!(report.result.pages_total(), 3);
    assert!(!addresses(&report).contains(&"I2.0".to_string()));
    assert!(logger.contains(LogLevel::Warning, "Click intercepted, skipping..."));
}

#[tokio::test]
async fn test_cancel_during_navigation_ends_before_extraction() {
    let stop_slot: Arc<Mutex<Option<eview_extractor::session::StopHandle>>> =
        Arc::new(Mutex::new(None));
    let hook_slot = Arc::clone(&stop_slot);
    let site = FakeSite::new(PROJECT, numbered_diagrams(3)).on_open(move || {
        if let Some(stop) = hook_slot.lock().unwrap().as_ref() {
            stop.stop();
        }
    });
    let (session, _) = session(&site, Arc::new(DisabledCache));
    *stop_slot.lock().unwrap() = Some(session.stop_handle());

    let report = session.run(&credentials(), &target()).await;

    assert!(report.is_cancelled(), "outcome: {:?}", report.outcome);
    assert_eq!(report.final_state, RunState::Cancelled);
    assert!(report.result.is_empty());
    assert_eq!(site.detail_reads(), 0);
    assert_eq!(site.quits(), 1);
    assert!(!session.is_running());
}

#[test]
fn test_worker_thread_runs_session() {
    let site = FakeSite::new(PROJECT, numbered_diagrams(3));
    let (session, _) = session(&site, Arc::new(DisabledCache));
    let session = Arc::new(session);

    let handle = Arc::clone(&session)
        .spawn_worker(credentials(), target())
        .unwrap();
    let report = handle.join().unwrap();

    assert!(report.is_completed());
    assert_eq!(report.result.len(), 6);
    assert_eq!(session.state(), RunState::Completed);
}
