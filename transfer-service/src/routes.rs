//! 路由模块

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use common::middleware::request_id_middleware;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{clickhouse, file, health};
use crate::state::AppState;

/// multipart 编码在文件内容之外的额外开销
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// 创建 API 路由
pub fn router(max_upload_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let clickhouse_routes = Router::new()
        .route("/connect", post(clickhouse::connect))
        .route("/tables", get(clickhouse::get_tables).post(clickhouse::get_tables))
        .route(
            "/columns/{table}",
            get(clickhouse::get_columns).post(clickhouse::get_columns),
        )
        .route("/export", post(clickhouse::export_data))
        .route("/import", post(clickhouse::import_data));

    let file_routes = Router::new()
        .route(
            "/upload",
            post(file::upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/columns", get(file::get_columns))
        .route("/preview", get(file::get_preview))
        .route("/import", post(file::import_file))
        .route("/export", post(file::export_file))
        .route("/cleanup", post(file::cleanup));

    Router::new()
        .nest("/api/clickhouse", clickhouse_routes)
        .nest("/api/file", file_routes)
        .route("/api/health", get(health::health_check))
}

/// 创建带中间件的完整应用
pub fn create_app(state: AppState, extra: Router<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ]);

    Router::new()
        .merge(router(state.config.max_upload_size))
        .merge(extra)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
