//! 数据传输服务
//!
//! 在 ClickHouse 与分隔符文本文件之间搬运数据，包括：
//! - 连接测试、表与列的元数据查询
//! - 表数据导出（JSON 或分隔符文件）
//! - 文件上传、预览与导入（按目标列类型转换）

mod clickhouse_service;
mod file_store;
mod gateway;
mod handlers;
mod routes;
mod state;

use axum::{routing::get, Json, Router};
use common::config::AppConfig;
use state::AppState;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "transfer-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "数据传输服务 API",
        version = "0.1.0",
        description = "ClickHouse 与分隔符文本文件之间的导入导出微服务"
    ),
    paths(
        handlers::clickhouse::connect,
        handlers::clickhouse::get_tables,
        handlers::clickhouse::get_columns,
        handlers::clickhouse::export_data,
        handlers::clickhouse::import_data,
        handlers::file::upload_file,
        handlers::file::get_columns,
        handlers::file::get_preview,
        handlers::file::import_file,
        handlers::file::export_file,
        handlers::file::cleanup,
        handlers::health::health_check,
    ),
    components(schemas(
        common::models::ClickHouseConfig,
        common::models::Column,
        common::models::ExportRequest,
        common::models::ImportRequest,
        common::models::ImportSummary,
        common::models::UploadResult,
        common::models::FileImportRequest,
        common::models::FileExportRequest,
        common::models::FileExportResult,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "clickhouse", description = "ClickHouse 端点"),
        (name = "file", description = "文件端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);
    let addr = format!("{}:{}", config.host, config.port);

    // 创建应用状态
    let state = AppState::new(config)?;
    if let Err(e) = state.file_store.ensure_upload_dir().await {
        warn!(error = %e, "创建上传目录失败");
    }

    // 创建路由
    let docs = Router::new().route("/api-docs/openapi.json", get(openapi_json));
    let app = routes::create_app(state, docs);

    // 启动服务
    info!(service = SERVICE_NAME, address = %addr, "启动服务");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// 读取工作目录下的 .env 文件，已存在的环境变量不覆盖
fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if std::env::var_os(key).is_none() {
                std::env::set_var(key, value.trim());
            }
        }
    }
}
