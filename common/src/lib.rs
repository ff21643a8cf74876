//! Shared building blocks for the ClickHouse transfer service.
//!
//! - `config`: process-wide configuration loaded once at start-up
//! - `errors`: the application error type and its HTTP mapping
//! - `extract`: request extractors that report failures in the envelope format
//! - `middleware`: request-id tagging
//! - `models`: request/response payloads and the tagged cell value
//! - `response`: the uniform response envelope
//! - `utils`: upload naming and SQL quoting helpers

pub mod config;
pub mod errors;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
