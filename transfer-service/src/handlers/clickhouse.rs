//! ClickHouse 相关端点

use axum::{
    extract::{Path, State},
    Json,
};

use common::errors::{AppError, AppResult};
use common::extract::ValidatedJson;
use common::models::{
    coerce_row, convert_json_row, CellValue, ClickHouseConfig, Column, ExportRequest,
    ImportRequest, ImportSummary,
};
use common::response::ApiResponse;
use common::utils::parse_delimiter;

use crate::clickhouse_service::ClickHouseService;
use crate::gateway;
use crate::state::AppState;

/// 测试 ClickHouse 连接
#[utoipa::path(
    post,
    path = "/api/clickhouse/connect",
    tag = "clickhouse",
    request_body = ClickHouseConfig,
    responses(
        (status = 200, description = "连接成功", body = ApiResponse<String>),
        (status = 400, description = "请求体无效"),
        (status = 500, description = "连接失败")
    )
)]
pub async fn connect(
    State(state): State<AppState>,
    ValidatedJson(config): ValidatedJson<ClickHouseConfig>,
) -> AppResult<Json<ApiResponse<()>>> {
    let _conn = gateway::connect(&state.http_client, config, &state.config.clickhouse).await?;
    Ok(Json(ApiResponse::message("Successfully connected to ClickHouse")))
}

/// 列出数据库中的表
#[utoipa::path(
    post,
    path = "/api/clickhouse/tables",
    tag = "clickhouse",
    request_body = ClickHouseConfig,
    responses(
        (status = 200, description = "表名列表", body = ApiResponse<Vec<String>>),
        (status = 500, description = "连接或查询失败")
    )
)]
pub async fn get_tables(
    State(state): State<AppState>,
    ValidatedJson(config): ValidatedJson<ClickHouseConfig>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let conn = gateway::connect(&state.http_client, config, &state.config.clickhouse).await?;
    let tables = ClickHouseService::new(&conn)
        .get_tables(conn.database())
        .await?;
    Ok(Json(ApiResponse::ok(tables)))
}

/// 列出表的列
#[utoipa::path(
    post,
    path = "/api/clickhouse/columns/{table}",
    tag = "clickhouse",
    params(
        ("table" = String, Path, description = "表名")
    ),
    request_body = ClickHouseConfig,
    responses(
        (status = 200, description = "列信息", body = ApiResponse<Vec<Column>>),
        (status = 400, description = "缺少表名"),
        (status = 500, description = "连接或查询失败")
    )
)]
pub async fn get_columns(
    State(state): State<AppState>,
    Path(table): Path<String>,
    ValidatedJson(config): ValidatedJson<ClickHouseConfig>,
) -> AppResult<Json<ApiResponse<Vec<Column>>>> {
    if table.trim().is_empty() {
        return Err(AppError::Validation("Table name is required".into()));
    }
    let conn = gateway::connect(&state.http_client, config, &state.config.clickhouse).await?;
    let columns = ClickHouseService::new(&conn)
        .get_columns(conn.database(), &table)
        .await?;
    Ok(Json(ApiResponse::ok(columns)))
}

/// 导出表数据
#[utoipa::path(
    post,
    path = "/api/clickhouse/export",
    tag = "clickhouse",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "导出的行", body = ApiResponse<Vec<Vec<String>>>),
        (status = 400, description = "缺少表名或查询"),
        (status = 500, description = "连接或查询失败")
    )
)]
pub async fn export_data(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ExportRequest>,
) -> AppResult<Json<ApiResponse<Vec<Vec<serde_json::Value>>>>> {
    req.check_target()?;
    let conn = gateway::connect(&state.http_client, req.config.clone(), &state.config.clickhouse)
        .await?;
    let result = ClickHouseService::new(&conn).export_data(&req).await?;
    Ok(Json(ApiResponse::ok(result.rows)))
}

/// 导入数据（内联行或已上传文件）
#[utoipa::path(
    post,
    path = "/api/clickhouse/import",
    tag = "clickhouse",
    request_body = ImportRequest,
    responses(
        (status = 200, description = "导入成功", body = ApiResponse<ImportSummary>),
        (status = 400, description = "请求无效或文件无法读取"),
        (status = 500, description = "连接或写入失败")
    )
)]
pub async fn import_data(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ImportRequest>,
) -> AppResult<Json<ApiResponse<ImportSummary>>> {
    let rows = collect_rows(&state, &req).await?;
    let conn = gateway::connect(&state.http_client, req.config, &state.config.clickhouse).await?;
    let summary = ClickHouseService::new(&conn)
        .import_data(&req.table, &req.columns, &rows)
        .await?;
    Ok(Json(ApiResponse::ok_with_message(
        summary,
        "Data imported successfully",
    )))
}

/// 将请求中的行转换为带类型的单元格
async fn collect_rows(state: &AppState, req: &ImportRequest) -> AppResult<Vec<Vec<CellValue>>> {
    if let Some(path) = req.file_path.as_deref().filter(|p| !p.trim().is_empty()) {
        let delimiter = parse_delimiter(req.delimiter.as_deref())?;
        let rows = state.file_store.data_rows(path, delimiter).await?;
        tracing::info!(path = %path, rows = rows.len(), "从文件读取导入数据");
        return Ok(rows
            .iter()
            .map(|row| coerce_row(row, &req.columns))
            .collect());
    }

    match &req.data {
        Some(data) => Ok(data
            .iter()
            .map(|row| convert_json_row(row, &req.columns))
            .collect()),
        None => Err(AppError::Validation(
            "Either data or filePath is required".into(),
        )),
    }
}
