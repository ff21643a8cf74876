//! Application state for the transfer service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::file_store::FileStore;

/// Application state shared across handlers.
///
/// Holds only immutable configuration and transport handles; ClickHouse
/// connections are opened per request.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub http_client: reqwest::Client,
    pub file_store: Arc<FileStore>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.clickhouse.connect_timeout())
            .timeout(config.clickhouse.request_timeout())
            .build()?;
        let file_store = Arc::new(FileStore::new(
            config.upload_dir.clone(),
            config.max_upload_size,
        ));

        Ok(Self {
            config,
            http_client,
            file_store,
        })
    }
}
