//! Shared data models.

pub mod clickhouse;
pub mod file;
pub mod value;

// Re-export commonly used types
pub use clickhouse::{
    ClickHouseConfig, Column, ExportRequest, ExportResult, ImportRequest, ImportSummary,
};
pub use file::{
    CleanupParams, FileExportRequest, FileExportResult, FileImportRequest, FileParams,
    PreviewParams, UploadResult,
};
pub use value::{coerce_row, convert_json_row, CellValue, TypeFamily};
