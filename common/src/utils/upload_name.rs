//! Unique names for uploaded files.

use chrono::Utc;

/// Builds the on-disk name for an upload: `<unix_nanos>_<original name>`.
///
/// Directory components and characters outside `[A-Za-z0-9._-]` are stripped
/// from the original name so the result always stays inside the upload dir.
pub fn upload_file_name(original: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{}_{}", nanos, sanitize_file_name(original))
}

fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
