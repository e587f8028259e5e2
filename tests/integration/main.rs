//! Integration tests for the extraction engine
//!
//! These tests drive full sessions against an in-memory model of the eVIEW
//! frontend, end to end from browser launch to the sorted result.

mod fake_browser;
mod selector_tests;
mod session_tests;
