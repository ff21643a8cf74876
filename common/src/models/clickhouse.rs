//! ClickHouse connection and transfer models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::config::ClickHouseDefaults;

/// Connection parameters supplied by the client.
///
/// Built fresh from each request body and never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClickHouseConfig {
    /// Server host name or address.
    #[serde(default)]
    pub host: String,
    /// Server port (the HTTP interface port when unset).
    #[serde(default)]
    pub port: Option<u16>,
    /// Target database.
    #[serde(default)]
    pub database: String,
    /// User name.
    #[serde(default)]
    pub user: String,
    /// Bearer token; takes precedence over password authentication when set.
    #[serde(default, skip_serializing)]
    pub jwt_token: String,
}

impl ClickHouseConfig {
    /// Fills every unset field from the server-side defaults.
    pub fn or_defaults(mut self, defaults: &ClickHouseDefaults) -> Self {
        if self.host.trim().is_empty() {
            self.host = defaults.host.clone();
        }
        if self.port.unwrap_or(0) == 0 {
            self.port = Some(defaults.port);
        }
        if self.database.trim().is_empty() {
            self.database = defaults.database.clone();
        }
        if self.user.trim().is_empty() {
            self.user = defaults.user.clone();
        }
        self
    }
}

/// Column descriptor shared by schema introspection and imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(from = "ColumnRepr")]
pub struct Column {
    /// Column name.
    pub name: String,
    /// ClickHouse type name, e.g. `Int32`, `String`, `Date`.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

impl Column {
    /// Creates a new column descriptor.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            nullable,
        }
    }
}

/// Wire forms accepted for a column: a full object or just its name.
#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnRepr {
    Full {
        name: String,
        #[serde(rename = "type", default = "default_column_type")]
        column_type: String,
        #[serde(default)]
        nullable: bool,
    },
    Name(String),
}

fn default_column_type() -> String {
    "String".to_string()
}

impl From<ColumnRepr> for Column {
    fn from(repr: ColumnRepr) -> Self {
        match repr {
            ColumnRepr::Full {
                name,
                column_type,
                nullable,
            } => Column::new(name, column_type, nullable),
            ColumnRepr::Name(name) => Column::new(name, default_column_type(), false),
        }
    }
}

/// Request body for exporting rows from a table.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ExportRequest {
    /// Connection parameters.
    #[serde(default)]
    pub config: ClickHouseConfig,
    /// Source table.
    #[serde(default)]
    pub table: String,
    /// Columns to select; all columns when empty.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Raw query overriding the generated `SELECT`.
    #[serde(default)]
    pub query: Option<String>,
}

impl ExportRequest {
    /// Checks that either a table or a raw query was supplied.
    pub fn check_target(&self) -> Result<(), crate::errors::AppError> {
        let has_query = self.query.as_deref().is_some_and(|q| !q.trim().is_empty());
        if !has_query && self.table.trim().is_empty() {
            return Err(crate::errors::AppError::Validation(
                "Table name or query is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rows produced by an export, buffered in full.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ExportResult {
    /// Column names as reported by the server.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Request body for importing rows into a table.
///
/// Rows come either inline (`data`) or from a previously uploaded file
/// (`filePath`, read with `delimiter`, header skipped).
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// Connection parameters.
    #[serde(default)]
    pub config: ClickHouseConfig,
    /// Target table; created when absent.
    #[validate(length(min = 1, message = "Table name is required"))]
    pub table: String,
    /// Target columns in field order.
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<Column>,
    /// Inline rows.
    #[serde(default)]
    pub data: Option<Vec<Vec<serde_json::Value>>>,
    /// Uploaded file to read rows from.
    #[serde(default)]
    pub file_path: Option<String>,
    /// Field delimiter for `filePath`.
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ImportSummary {
    /// Rows appended to the batch and sent.
    pub rows_imported: usize,
    /// Row count of the table after the batch was sent.
    pub total_rows: u64,
}
