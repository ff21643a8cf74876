//! 文件相关端点

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};

use common::errors::{AppError, AppResult};
use common::extract::{QueryParams, ValidatedJson};
use common::models::{
    coerce_row, CleanupParams, ExportRequest, FileExportRequest, FileExportResult,
    FileImportRequest, FileParams, ImportSummary, PreviewParams, UploadResult,
};
use common::response::ApiResponse;
use common::utils::parse_delimiter;

use crate::clickhouse_service::ClickHouseService;
use crate::gateway;
use crate::state::AppState;

/// 上传文件（multipart 字段名 `file`）
#[utoipa::path(
    post,
    path = "/api/file/upload",
    tag = "file",
    responses(
        (status = 200, description = "文件已保存", body = ApiResponse<UploadResult>),
        (status = 400, description = "缺少文件或文件过大")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ApiResponse<UploadResult>>> {
    let mut multipart = multipart
        .map_err(|_| AppError::Validation("Failed to get file from request".into()))?;
    let limit = state.file_store.max_upload_size();

    let mut upload: Option<(String, axum::body::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::Validation("Failed to get file from request".into()))?;
    tracing::info!(file = %file_name, size = bytes.len(), "收到文件上传");

    let path = state.file_store.save_upload(&file_name, &bytes).await?;
    Ok(Json(ApiResponse::ok(UploadResult {
        file_path: path.display().to_string(),
    })))
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation(format!("Failed to read uploaded file: {}", err.body_text()))
    }
}

/// 读取文件首行作为列名
#[utoipa::path(
    get,
    path = "/api/file/columns",
    tag = "file",
    params(FileParams),
    responses(
        (status = 200, description = "列名", body = ApiResponse<Vec<String>>),
        (status = 400, description = "文件不存在或无法解析")
    )
)]
pub async fn get_columns(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<FileParams>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let path = require_path(&params.file_path)?;
    let delimiter = parse_delimiter(params.delimiter.as_deref())?;
    let header = state.file_store.header(path, delimiter).await?;
    tracing::info!(path = %path, columns = header.len(), "读取文件列名");
    Ok(Json(ApiResponse::ok(header)))
}

/// 预览文件数据行
#[utoipa::path(
    get,
    path = "/api/file/preview",
    tag = "file",
    params(PreviewParams),
    responses(
        (status = 200, description = "数据行", body = ApiResponse<Vec<Vec<String>>>),
        (status = 400, description = "文件不存在或无法解析")
    )
)]
pub async fn get_preview(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<PreviewParams>,
) -> AppResult<Json<ApiResponse<Vec<Vec<String>>>>> {
    let path = require_path(&params.file_path)?;
    let delimiter = parse_delimiter(params.delimiter.as_deref())?;
    let rows = state
        .file_store
        .preview(path, delimiter, params.limit())
        .await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// 将已上传文件导入 ClickHouse
#[utoipa::path(
    post,
    path = "/api/file/import",
    tag = "file",
    request_body = FileImportRequest,
    responses(
        (status = 200, description = "导入成功", body = ApiResponse<ImportSummary>),
        (status = 400, description = "请求无效或文件无法读取"),
        (status = 500, description = "连接或写入失败")
    )
)]
pub async fn import_file(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<FileImportRequest>,
) -> AppResult<Json<ApiResponse<ImportSummary>>> {
    let delimiter = parse_delimiter(req.delimiter.as_deref())?;
    tracing::info!(path = %req.file_path, table = %req.table, "开始文件导入");

    let rows: Vec<_> = state
        .file_store
        .data_rows(&req.file_path, delimiter)
        .await?
        .iter()
        .map(|row| coerce_row(row, &req.columns))
        .collect();

    let config = req.config.unwrap_or_default();
    let conn = gateway::connect(&state.http_client, config, &state.config.clickhouse).await?;
    let summary = ClickHouseService::new(&conn)
        .import_data(&req.table, &req.columns, &rows)
        .await?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// 将表数据导出到上传目录中的分隔符文件
#[utoipa::path(
    post,
    path = "/api/file/export",
    tag = "file",
    request_body = FileExportRequest,
    responses(
        (status = 200, description = "导出文件已生成", body = ApiResponse<FileExportResult>),
        (status = 400, description = "缺少表名或查询"),
        (status = 500, description = "连接、查询或写入失败")
    )
)]
pub async fn export_file(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<FileExportRequest>,
) -> AppResult<Json<ApiResponse<FileExportResult>>> {
    let delimiter = parse_delimiter(req.delimiter.as_deref())?;
    let export = ExportRequest {
        config: req.config,
        table: req.table,
        columns: req.columns,
        query: req.query,
    };
    export.check_target()?;

    let conn =
        gateway::connect(&state.http_client, export.config.clone(), &state.config.clickhouse)
            .await?;
    let result = ClickHouseService::new(&conn).export_data(&export).await?;

    let name = if export.table.trim().is_empty() {
        "query"
    } else {
        export.table.as_str()
    };
    state.file_store.ensure_upload_dir().await?;
    let path = state.file_store.export_path(name);
    let rows_exported = result.rows.len();
    state
        .file_store
        .write_delimited(path.clone(), result.columns, result.rows, delimiter)
        .await?;

    tracing::info!(path = %path.display(), rows = rows_exported, "导出文件已生成");
    Ok(Json(ApiResponse::ok(FileExportResult {
        file_path: path.display().to_string(),
        rows_exported,
    })))
}

/// 删除已上传的文件
#[utoipa::path(
    post,
    path = "/api/file/cleanup",
    tag = "file",
    params(CleanupParams),
    responses(
        (status = 200, description = "文件已删除"),
        (status = 400, description = "缺少路径或文件不存在"),
        (status = 500, description = "删除失败")
    )
)]
pub async fn cleanup(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CleanupParams>,
) -> AppResult<Json<ApiResponse<()>>> {
    let path = params
        .file_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Validation("File path is required".into()))?;
    state.file_store.cleanup(path).await?;
    Ok(Json(ApiResponse::message("File cleaned up successfully")))
}

fn require_path(path: &str) -> AppResult<&str> {
    if path.trim().is_empty() {
        return Err(AppError::Validation("File path is required".into()));
    }
    Ok(path)
}
