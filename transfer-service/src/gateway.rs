//! ClickHouse 连接网关
//!
//! 通过 ClickHouse HTTP 接口执行语句。每个请求建立一个独立的
//! [`ClickHouseConnection`]，请求结束时随之释放，不跨请求复用。

use std::time::Instant;

use async_trait::async_trait;
use common::config::ClickHouseDefaults;
use common::errors::{AppError, AppResult};
use common::models::{CellValue, ClickHouseConfig, ExportResult};
use serde::Deserialize;

/// 语句执行接口，导入导出逻辑只依赖此 trait
#[async_trait]
pub trait Executor: Send + Sync {
    /// 执行不返回结果集的语句（DDL 等）
    async fn execute(&self, sql: &str) -> AppResult<()>;

    /// 执行查询并缓冲全部结果
    async fn query(&self, sql: &str) -> AppResult<ExportResult>;

    /// 发送一个批次，`sql` 为 `INSERT ... FORMAT JSONCompactEachRow`
    async fn send_batch(&self, sql: &str, batch: Batch) -> AppResult<()>;
}

/// 多行插入批次
///
/// 行在追加时即序列化为 JSONCompactEachRow 格式，发送时整体作为一个请求体。
#[derive(Debug, Default)]
pub struct Batch {
    width: usize,
    rows: usize,
    body: Vec<u8>,
}

impl Batch {
    /// 创建指定列数的空批次
    pub fn new(width: usize) -> Self {
        Self {
            width,
            rows: 0,
            body: Vec::new(),
        }
    }

    /// 追加一行，列数不符时返回错误
    pub fn append(&mut self, row: &[CellValue]) -> AppResult<()> {
        if row.len() != self.width {
            return Err(AppError::Validation(format!(
                "failed to append row {}: expected {} values, got {}",
                self.rows,
                self.width,
                row.len()
            )));
        }
        serde_json::to_writer(&mut self.body, row).map_err(|e| {
            AppError::Internal(format!("failed to append row {}: {}", self.rows, e))
        })?;
        self.body.push(b'\n');
        self.rows += 1;
        Ok(())
    }

    /// 已追加的行数
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// 序列化后的请求体
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// 认证方式
#[derive(Debug, Clone)]
enum Credentials {
    Basic { user: String, password: String },
    Bearer(String),
}

/// 单个请求范围内的 ClickHouse 连接
pub struct ClickHouseConnection {
    client: reqwest::Client,
    endpoint: String,
    database: String,
    credentials: Credentials,
    max_execution_time: u64,
}

/// JSONCompact 格式的查询响应
#[derive(Debug, Deserialize)]
struct CompactResponse {
    #[serde(default)]
    meta: Vec<CompactMeta>,
    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct CompactMeta {
    name: String,
}

/// 将 `localhost` 和 IPv6 回环地址统一解析为 IPv4 回环地址
pub fn resolve_host(host: &str) -> &str {
    match host.trim() {
        "localhost" | "::1" | "[::1]" => "127.0.0.1",
        other => other,
    }
}

/// 构造 HTTP 接口地址；已带协议前缀的主机名原样使用
pub fn endpoint_for(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("http://{}:{}", resolve_host(host), port)
    }
}

/// 打开连接并执行存活探测
///
/// 未设置的字段取服务端默认值。请求中提供 `jwtToken` 时使用 Bearer 认证，
/// 否则使用用户名加服务端配置的密码。
pub async fn connect(
    client: &reqwest::Client,
    config: ClickHouseConfig,
    defaults: &ClickHouseDefaults,
) -> AppResult<ClickHouseConnection> {
    let config = config.or_defaults(defaults);
    let port = config.port.unwrap_or(defaults.port);
    let endpoint = endpoint_for(&config.host, port);

    let credentials = if config.jwt_token.trim().is_empty() {
        Credentials::Basic {
            user: config.user.clone(),
            password: defaults.password.clone(),
        }
    } else {
        Credentials::Bearer(config.jwt_token.clone())
    };

    let conn = ClickHouseConnection {
        client: client.clone(),
        endpoint,
        database: config.database.clone(),
        credentials,
        max_execution_time: defaults.max_execution_time,
    };

    conn.ping().await?;
    tracing::debug!(endpoint = %conn.endpoint, database = %conn.database, "ClickHouse 连接已建立");
    Ok(conn)
}

impl ClickHouseConnection {
    /// 目标数据库
    pub fn database(&self) -> &str {
        &self.database
    }

    /// 存活探测
    pub async fn ping(&self) -> AppResult<()> {
        let start = Instant::now();
        let response = self
            .request(&[])
            .body("SELECT 1")
            .send()
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::DatabaseConnection(format!(
                "failed to ping ClickHouse ({}): {}",
                status,
                text.trim()
            )));
        }
        tracing::debug!(latency_ms = start.elapsed().as_millis() as u64, "ClickHouse ping");
        Ok(())
    }

    fn request(&self, extra: &[(&str, &str)]) -> reqwest::RequestBuilder {
        let max_execution_time = self.max_execution_time.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("database", self.database.as_str()),
            ("max_execution_time", max_execution_time.as_str()),
        ];
        params.extend_from_slice(extra);

        let builder = self.client.post(&self.endpoint).query(&params);
        match &self.credentials {
            Credentials::Basic { user, password } => builder.basic_auth(user, Some(password)),
            Credentials::Bearer(token) => builder.bearer_auth(token),
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?;
        if !status.is_success() {
            return Err(AppError::DatabaseQuery(text.trim().to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl Executor for ClickHouseConnection {
    async fn execute(&self, sql: &str) -> AppResult<()> {
        tracing::debug!(sql = %sql, "执行语句");
        self.send(self.request(&[]).body(sql.to_string())).await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> AppResult<ExportResult> {
        tracing::debug!(sql = %sql, "执行查询");
        let text = self
            .send(
                self.request(&[
                    ("default_format", "JSONCompact"),
                    ("output_format_json_quote_64bit_integers", "0"),
                    ("output_format_json_quote_denormals", "1"),
                ])
                .body(sql.to_string()),
            )
            .await?;

        if text.trim().is_empty() {
            return Ok(ExportResult::default());
        }
        let parsed: CompactResponse = serde_json::from_str(&text)
            .map_err(|e| AppError::DatabaseQuery(format!("unexpected response: {}", e)))?;
        Ok(ExportResult {
            columns: parsed.meta.into_iter().map(|m| m.name).collect(),
            rows: parsed.data,
        })
    }

    async fn send_batch(&self, sql: &str, batch: Batch) -> AppResult<()> {
        tracing::debug!(sql = %sql, rows = batch.len(), "发送批次");
        self.send(
            self.request(&[
                ("query", sql),
                ("date_time_input_format", "best_effort"),
            ])
            .body(batch.into_body()),
        )
        .await?;
        Ok(())
    }
}
