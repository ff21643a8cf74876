//! File store request and response models.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::clickhouse::{ClickHouseConfig, Column};

/// Query parameters identifying a delimited file.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct FileParams {
    /// Path returned by the upload endpoint.
    #[serde(default)]
    pub file_path: String,
    /// Single-character field delimiter (default `,`).
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Query parameters for a file preview.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Maximum number of data rows; non-numeric values mean the default.
    #[serde(default)]
    pub limit: Option<String>,
}

impl PreviewParams {
    /// Default number of preview rows.
    pub const DEFAULT_LIMIT: usize = 100;

    /// Parsed row limit.
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(Self::DEFAULT_LIMIT)
    }
}

/// Query parameters for deleting an uploaded file.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct CleanupParams {
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Response payload of a successful upload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub file_path: String,
}

/// Request body for importing an uploaded file into a table.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileImportRequest {
    #[validate(length(min = 1, message = "File path is required"))]
    pub file_path: String,
    #[validate(length(min = 1, message = "Table name is required"))]
    pub table: String,
    #[validate(length(min = 1, message = "At least one column is required"))]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Connection parameters; server defaults when omitted.
    #[serde(default)]
    pub config: Option<ClickHouseConfig>,
}

/// Request body for exporting a table into a delimited file.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct FileExportRequest {
    #[serde(default)]
    pub config: ClickHouseConfig,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub delimiter: Option<String>,
}

/// Response payload of a file export.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileExportResult {
    pub file_path: String,
    pub rows_exported: usize,
}
