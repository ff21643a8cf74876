//! SQL quoting helpers for ClickHouse statements.

/// Quotes an identifier with backticks, escaping embedded backticks and backslashes.
///
/// Dotted names (`db.table`) are quoted part by part.
pub fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| {
            let escaped = part.replace('\\', "\\\\").replace('`', "\\`");
            format!("`{}`", escaped)
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Quotes a string literal with single quotes.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
