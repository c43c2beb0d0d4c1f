//! Integration tests for schoolscrape
//!
//! Stub sites and sessions drive the downloader state machine; wiremock
//! servers stand in for the real site where HTTP behavior matters.

mod common;
mod downloader_tests;
mod pipeline_tests;
mod scheduler_tests;
mod session_tests;
