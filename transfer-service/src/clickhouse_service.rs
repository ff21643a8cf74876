//! ClickHouse 元数据查询与数据导入导出服务

use common::errors::{AppError, AppResult};
use common::models::value::strip_nullable;
use common::models::{CellValue, Column, ExportRequest, ExportResult, ImportSummary};
use common::utils::{quote_identifier, quote_literal};

use crate::gateway::{Batch, Executor};

/// 导入时每处理多少行输出一次进度日志
const PROGRESS_INTERVAL: usize = 1000;

/// 基于单个连接的 ClickHouse 服务
pub struct ClickHouseService<'a, E: Executor> {
    conn: &'a E,
}

impl<'a, E: Executor> ClickHouseService<'a, E> {
    /// 创建新的服务实例
    pub fn new(conn: &'a E) -> Self {
        Self { conn }
    }

    /// 列出数据库中的所有表，顺序与元数据查询一致
    pub async fn get_tables(&self, database: &str) -> AppResult<Vec<String>> {
        let sql = format!(
            "SELECT name FROM system.tables WHERE database = {}",
            quote_literal(database)
        );
        tracing::info!(database = %database, "查询表列表");

        let result = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(format!("failed to query tables: {}", e)))?;

        let tables: Vec<String> = result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|v| value_to_string(&v))
            .collect();

        tracing::info!(database = %database, count = tables.len(), "表列表查询完成");
        Ok(tables)
    }

    /// 查询表的列名、类型与可空标记
    pub async fn get_columns(&self, database: &str, table: &str) -> AppResult<Vec<Column>> {
        let sql = format!(
            "SELECT name, type, toString(startsWith(type, 'Nullable(')) AS is_nullable \
             FROM system.columns WHERE database = {} AND table = {}",
            quote_literal(database),
            quote_literal(table)
        );

        let result = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(format!("failed to query columns: {}", e)))?;

        result
            .rows
            .into_iter()
            .map(|row| match row.as_slice() {
                [name, column_type, marker] => Ok(Column::new(
                    value_to_string(name),
                    value_to_string(column_type),
                    is_nullable_marker(marker),
                )),
                _ => Err(AppError::DatabaseQuery(format!(
                    "failed to scan column: expected 3 values, got {}",
                    row.len()
                ))),
            })
            .collect()
    }

    /// 导出数据，结果全部缓冲在内存中
    pub async fn export_data(&self, req: &ExportRequest) -> AppResult<ExportResult> {
        let sql = build_select(req);
        tracing::info!(table = %req.table, columns = ?req.columns, "导出数据");

        let result = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(format!("failed to execute query: {}", e)))?;

        tracing::info!(table = %req.table, rows = result.rows.len(), "导出完成");
        Ok(result)
    }

    /// 建表（已存在时不做任何操作）
    pub async fn create_table(&self, table: &str, columns: &[Column]) -> AppResult<()> {
        let sql = build_create_table(table, columns)?;
        self.conn
            .execute(&sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(format!("failed to create table: {}", e)))
    }

    /// 导入数据：建表、整批追加、一次性发送，最后校验表行数
    pub async fn import_data(
        &self,
        table: &str,
        columns: &[Column],
        rows: &[Vec<CellValue>],
    ) -> AppResult<ImportSummary> {
        tracing::info!(table = %table, columns = columns.len(), rows = rows.len(), "开始导入");

        self.create_table(table, columns).await?;

        let sql = build_insert(table, columns);
        let mut batch = Batch::new(columns.len());
        for (i, row) in rows.iter().enumerate() {
            if i % PROGRESS_INTERVAL == 0 {
                tracing::debug!(row = i, "追加批次行");
            }
            batch.append(row)?;
        }

        let rows_imported = batch.len();
        if batch.is_empty() {
            tracing::info!(table = %table, "没有数据行，跳过发送");
        } else {
            self.conn
                .send_batch(&sql, batch)
                .await
                .map_err(|e| AppError::DatabaseQuery(format!("failed to send batch: {}", e)))?;
        }

        let total_rows = self.count_rows(table).await?;
        tracing::info!(table = %table, rows_imported, total_rows, "导入完成");

        Ok(ImportSummary {
            rows_imported,
            total_rows,
        })
    }

    /// 统计表行数
    pub async fn count_rows(&self, table: &str) -> AppResult<u64> {
        let sql = format!("SELECT count() FROM {}", quote_identifier(table));
        let result = self
            .conn
            .query(&sql)
            .await
            .map_err(|e| AppError::DatabaseQuery(format!("failed to verify import: {}", e)))?;

        let count = result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0);
        Ok(count)
    }
}

/// 构造导出语句；提供了原始查询时直接使用
pub fn build_select(req: &ExportRequest) -> String {
    if let Some(query) = req.query.as_deref().filter(|q| !q.trim().is_empty()) {
        return query.to_string();
    }
    let columns = if req.columns.is_empty() {
        "*".to_string()
    } else {
        req.columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("SELECT {} FROM {}", columns, quote_identifier(&req.table))
}

/// 构造建表语句，可空列包装为 `Nullable(T)`
pub fn build_create_table(table: &str, columns: &[Column]) -> AppResult<String> {
    if columns.is_empty() {
        return Err(AppError::Validation("At least one column is required".into()));
    }
    let mut defs = Vec::with_capacity(columns.len());
    for col in columns {
        if col.name.trim().is_empty() {
            return Err(AppError::Validation("Column name is required".into()));
        }
        let base = strip_nullable(col.column_type.trim());
        let base = if base.is_empty() { "String" } else { base };
        let column_type = if col.nullable {
            format!("Nullable({})", base)
        } else {
            base.to_string()
        };
        defs.push(format!("{} {}", quote_identifier(&col.name), column_type));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE = MergeTree()\nORDER BY tuple()",
        quote_identifier(table),
        defs.join(",\n    ")
    ))
}

/// 构造批量插入语句
pub fn build_insert(table: &str, columns: &[Column]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) FORMAT JSONCompactEachRow",
        quote_identifier(table),
        names
    )
}

fn is_nullable_marker(marker: &serde_json::Value) -> bool {
    match marker {
        serde_json::Value::String(s) => s == "1",
        serde_json::Value::Number(n) => n.as_u64() == Some(1),
        serde_json::Value::Bool(b) => *b,
        _ => false,
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use common::models::{coerce_row, convert_json_row};
    use serde_json::json;
    use std::sync::Mutex;

    /// 内存中的执行器，记录语句并模拟一张表
    #[derive(Default)]
    struct FakeExecutor {
        statements: Mutex<Vec<String>>,
        sent: Mutex<Vec<String>>,
        responses: Mutex<Vec<ExportResult>>,
        fail_send: bool,
    }

    impl FakeExecutor {
        fn with_responses(responses: Vec<ExportResult>) -> Self {
            Self {
                responses: Mutex::new(responses),
                ..Default::default()
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Executor for FakeExecutor {
        async fn execute(&self, sql: &str) -> AppResult<()> {
            self.statements.lock().unwrap().push(sql.to_string());
            Ok(())
        }

        async fn query(&self, sql: &str) -> AppResult<ExportResult> {
            self.statements.lock().unwrap().push(sql.to_string());
            if sql.starts_with("SELECT count()") {
                let rows: usize = self
                    .sent
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|body| body.lines().count())
                    .sum();
                return Ok(ExportResult {
                    columns: vec!["count()".into()],
                    rows: vec![vec![json!(rows)]],
                });
            }
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(AppError::DatabaseQuery("no canned response".into()));
            }
            Ok(responses.remove(0))
        }

        async fn send_batch(&self, sql: &str, batch: Batch) -> AppResult<()> {
            self.statements.lock().unwrap().push(sql.to_string());
            if self.fail_send {
                return Err(AppError::DatabaseQuery("Code: 27. Cannot parse input".into()));
            }
            let body = String::from_utf8(batch.into_body()).unwrap();
            self.sent.lock().unwrap().push(body);
            Ok(())
        }
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", "Int32", false),
            Column::new("name", "String", false),
            Column::new("day", "Date", false),
        ]
    }

    fn text_rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_import_keeps_unparseable_values_as_strings() {
        let exec = FakeExecutor::default();
        let service = ClickHouseService::new(&exec);
        let cols = columns();
        let rows: Vec<Vec<CellValue>> = text_rows(&[
            &["1", "Alice", "2024-01-01"],
            &["2", "Bob", "bad-date"],
            &["x", "Carol", "2024-01-03"],
        ])
        .iter()
        .map(|r| coerce_row(r, &cols))
        .collect();

        assert_eq!(
            rows[0][2],
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );

        let summary = service.import_data("people", &cols, &rows).await.unwrap();
        assert_eq!(summary.rows_imported, 3);
        assert_eq!(summary.total_rows, 3);

        let sent = exec.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0],
            "[1,\"Alice\",\"2024-01-01\"]\n[2,\"Bob\",\"bad-date\"]\n[\"x\",\"Carol\",\"2024-01-03\"]\n"
        );

        let statements = exec.statements();
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS `people`"));
        assert_eq!(
            statements[1],
            "INSERT INTO `people` (`id`, `name`, `day`) FORMAT JSONCompactEachRow"
        );
        assert_eq!(statements[2], "SELECT count() FROM `people`");
    }

    #[tokio::test]
    async fn test_append_failure_aborts_before_send() {
        let exec = FakeExecutor::default();
        let service = ClickHouseService::new(&exec);
        let cols = columns();
        let rows = vec![
            vec![CellValue::Int64(1), CellValue::String("a".into()), CellValue::Null],
            vec![CellValue::Int64(2)],
        ];

        let err = service.import_data("t", &cols, &rows).await.unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert!(exec.sent.lock().unwrap().is_empty());
        assert!(!exec.statements().iter().any(|s| s.starts_with("INSERT")));
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let exec = FakeExecutor {
            fail_send: true,
            ..Default::default()
        };
        let service = ClickHouseService::new(&exec);
        let rows = vec![vec![
            CellValue::String("x".into()),
            CellValue::String("a".into()),
            CellValue::String("b".into()),
        ]];
        let err = service.import_data("t", &columns(), &rows).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to send batch"));
    }

    #[tokio::test]
    async fn test_empty_import_still_creates_table() {
        let exec = FakeExecutor::default();
        let service = ClickHouseService::new(&exec);
        let summary = service.import_data("t", &columns(), &[]).await.unwrap();
        assert_eq!(summary.rows_imported, 0);
        assert_eq!(summary.total_rows, 0);
        assert!(exec.statements()[0].starts_with("CREATE TABLE"));
        assert!(!exec.statements().iter().any(|s| s.starts_with("INSERT")));
        assert!(exec.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exported_rows_reimport_unchanged() {
        let exported = vec![
            vec![json!(1), json!(""), json!(u64::MAX), json!("nan"), json!("2024-01-01"), json!(null)],
            vec![json!(-7), json!("text"), json!(0), json!(2.5), json!("2024-12-31"), json!(42)],
            vec![json!(3), json!(null), json!(9), json!("-inf"), json!("2000-02-29"), json!(null)],
        ];
        let exec = FakeExecutor::with_responses(vec![ExportResult {
            columns: vec![
                "id".into(),
                "note".into(),
                "big".into(),
                "score".into(),
                "day".into(),
                "extra".into(),
            ],
            rows: exported.clone(),
        }]);
        let service = ClickHouseService::new(&exec);

        let req: ExportRequest =
            serde_json::from_value(json!({"table": "source"})).unwrap();
        let result = service.export_data(&req).await.unwrap();

        let cols = vec![
            Column::new("id", "Int32", false),
            Column::new("note", "Nullable(String)", true),
            Column::new("big", "UInt64", false),
            Column::new("score", "Float64", false),
            Column::new("day", "Date", false),
            Column::new("extra", "Nullable(Int32)", true),
        ];
        let rows: Vec<Vec<CellValue>> = result
            .rows
            .iter()
            .map(|row| convert_json_row(row, &cols))
            .collect();
        service.import_data("copy", &cols, &rows).await.unwrap();

        let expected: String = exported
            .iter()
            .map(|row| format!("{}\n", serde_json::to_string(row).unwrap()))
            .collect();
        assert_eq!(exec.sent.lock().unwrap()[0], expected);
    }

    #[tokio::test]
    async fn test_get_tables_keeps_server_order() {
        let exec = FakeExecutor::with_responses(vec![ExportResult {
            columns: vec!["name".into()],
            rows: vec![vec![json!("zeta")], vec![json!("alpha")]],
        }]);
        let service = ClickHouseService::new(&exec);
        let tables = service.get_tables("analytics").await.unwrap();
        assert_eq!(tables, vec!["zeta", "alpha"]);
        assert_eq!(
            exec.statements()[0],
            "SELECT name FROM system.tables WHERE database = 'analytics'"
        );
    }

    #[tokio::test]
    async fn test_get_columns_reads_nullable_marker() {
        let exec = FakeExecutor::with_responses(vec![ExportResult {
            columns: vec!["name".into(), "type".into(), "is_nullable".into()],
            rows: vec![
                vec![json!("id"), json!("UInt64"), json!("0")],
                vec![json!("note"), json!("Nullable(String)"), json!("1")],
            ],
        }]);
        let service = ClickHouseService::new(&exec);
        let cols = service.get_columns("db", "t").await.unwrap();
        assert_eq!(
            cols,
            vec![
                Column::new("id", "UInt64", false),
                Column::new("note", "Nullable(String)", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_query_errors_carry_context() {
        let exec = FakeExecutor::default();
        let service = ClickHouseService::new(&exec);
        let err = service.get_tables("db").await.unwrap_err();
        assert!(err.to_string().starts_with("failed to query tables"));
    }

    #[test]
    fn test_build_select_variants() {
        let mut req: ExportRequest =
            serde_json::from_value(json!({"table": "events", "columns": ["id", "ts"]})).unwrap();
        assert_eq!(build_select(&req), "SELECT `id`, `ts` FROM `events`");

        req.columns.clear();
        assert_eq!(build_select(&req), "SELECT * FROM `events`");

        req.query = Some("SELECT 42".into());
        assert_eq!(build_select(&req), "SELECT 42");
    }

    #[test]
    fn test_create_table_wraps_nullable_once() {
        let cols = vec![
            Column::new("id", "Int32", false),
            Column::new("note", "Nullable(String)", true),
            Column::new("score", "Float64", true),
        ];
        let sql = build_create_table("t", &cols).unwrap();
        assert!(sql.contains("`id` Int32"));
        assert!(sql.contains("`note` Nullable(String)"));
        assert!(sql.contains("`score` Nullable(Float64)"));
        assert!(sql.contains("ENGINE = MergeTree()"));
        assert!(sql.ends_with("ORDER BY tuple()"));
    }

    #[test]
    fn test_create_table_rejects_blank_column() {
        let cols = vec![Column::new(" ", "Int32", false)];
        assert!(build_create_table("t", &cols).is_err());
    }
}
