//! Utility functions and helpers.

pub mod delimiter;
pub mod sql;
pub mod upload_name;

// Re-export commonly used helpers
pub use delimiter::parse_delimiter;
pub use sql::{quote_identifier, quote_literal};
pub use upload_name::upload_file_name;
