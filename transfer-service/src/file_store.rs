//! 本地分隔符文本文件存储
//!
//! 读取使用同步的 `csv` 读取器，放在 `spawn_blocking` 中执行，
//! 上传与删除使用 `tokio::fs`。

use std::fs::File;
use std::path::{Path, PathBuf};

use common::errors::{AppError, AppResult};
use common::utils::upload_file_name;

/// 上传目录及大小限制
#[derive(Debug, Clone)]
pub struct FileStore {
    upload_dir: PathBuf,
    max_upload_size: u64,
}

impl FileStore {
    /// 创建文件存储
    pub fn new(upload_dir: impl Into<PathBuf>, max_upload_size: u64) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_upload_size,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// 确保上传目录存在
    pub async fn ensure_upload_dir(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| AppError::Io(format!("failed to create upload directory: {}", e)))
    }

    /// 读取整个文件
    pub async fn read_delimited(&self, path: &str, delimiter: u8) -> AppResult<Vec<Vec<String>>> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || read_records(&path, delimiter, None)).await?
    }

    /// 读取首行作为列名
    pub async fn header(&self, path: &str, delimiter: u8) -> AppResult<Vec<String>> {
        let path = path.to_string();
        let mut records =
            tokio::task::spawn_blocking(move || read_records(&path, delimiter, Some(1))).await??;
        if records.is_empty() {
            return Err(AppError::FileFormat("file is empty".into()));
        }
        Ok(records.swap_remove(0))
    }

    /// 预览至多 `limit` 行数据（不含首行）
    pub async fn preview(
        &self,
        path: &str,
        delimiter: u8,
        limit: usize,
    ) -> AppResult<Vec<Vec<String>>> {
        let path = path.to_string();
        let take = limit.saturating_add(1);
        let records =
            tokio::task::spawn_blocking(move || read_records(&path, delimiter, Some(take))).await??;
        if records.is_empty() {
            return Err(AppError::FileFormat("file is empty".into()));
        }
        let rows: Vec<Vec<String>> = records.into_iter().skip(1).collect();
        tracing::debug!(rows = rows.len(), limit, "生成预览");
        Ok(rows)
    }

    /// 读取全部数据行（跳过首行）
    pub async fn data_rows(&self, path: &str, delimiter: u8) -> AppResult<Vec<Vec<String>>> {
        let records = self.read_delimited(path, delimiter).await?;
        if records.is_empty() {
            return Err(AppError::FileFormat("file is empty".into()));
        }
        Ok(records.into_iter().skip(1).collect())
    }

    /// 写出带表头的分隔符文件
    pub async fn write_delimited(
        &self,
        path: PathBuf,
        header: Vec<String>,
        rows: Vec<Vec<serde_json::Value>>,
        delimiter: u8,
    ) -> AppResult<()> {
        tokio::task::spawn_blocking(move || write_records(&path, &header, &rows, delimiter))
            .await?
    }

    /// 删除上传目录中的文件
    pub async fn cleanup(&self, path: &str) -> AppResult<()> {
        let target = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| AppError::from_io(path, e))?;
        let root = tokio::fs::canonicalize(&self.upload_dir)
            .await
            .map_err(|e| AppError::from_io(&self.upload_dir.display().to_string(), e))?;
        if !target.starts_with(&root) {
            return Err(AppError::Validation(format!(
                "File is outside the upload directory: {}",
                path
            )));
        }
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| AppError::from_io(path, e))?;
        tracing::info!(path = %path, "文件已清理");
        Ok(())
    }

    /// 保存上传文件，返回生成的路径
    ///
    /// 超过大小限制的文件在写入磁盘前即被拒绝；恰好等于限制的文件可以保存。
    pub async fn save_upload(&self, original_name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        if bytes.len() as u64 > self.max_upload_size {
            return Err(AppError::PayloadTooLarge {
                limit: self.max_upload_size,
            });
        }
        self.ensure_upload_dir().await?;

        let path = self.upload_dir.join(upload_file_name(original_name));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Io(format!("failed to save file: {}", e)))?;

        tracing::info!(path = %path.display(), size = bytes.len(), "文件已保存");
        Ok(path)
    }

    /// 为导出文件生成路径
    pub fn export_path(&self, name: &str) -> PathBuf {
        self.upload_dir.join(upload_file_name(&format!("{}.csv", name)))
    }
}

fn reader_for(path: &str, delimiter: u8) -> AppResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| AppError::from_io(path, e))?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .delimiter(delimiter)
        .from_reader(file))
}

fn read_records(path: &str, delimiter: u8, max: Option<usize>) -> AppResult<Vec<Vec<String>>> {
    let mut reader = reader_for(path, delimiter)?;
    let mut records = Vec::new();
    for result in reader.records() {
        if max.is_some_and(|m| records.len() >= m) {
            break;
        }
        let record = result.map_err(|e| csv_error(path, e))?;
        records.push(record.iter().map(String::from).collect());
    }
    Ok(records)
}

fn write_records(
    path: &Path,
    header: &[String],
    rows: &[Vec<serde_json::Value>],
    delimiter: u8,
) -> AppResult<()> {
    let display = path.display().to_string();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| csv_error(&display, e))?;

    if !header.is_empty() {
        writer
            .write_record(header)
            .map_err(|e| csv_error(&display, e))?;
    }
    for row in rows {
        writer
            .write_record(row.iter().map(cell_text))
            .map_err(|e| csv_error(&display, e))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::Io(format!("{}: {}", display, e)))?;
    Ok(())
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_error(path: &str, err: csv::Error) -> AppError {
    if !err.is_io_error() {
        return AppError::FileFormat(err.to_string());
    }
    match err.into_kind() {
        csv::ErrorKind::Io(io) => AppError::from_io(path, io),
        other => AppError::Io(format!("{}: {:?}", path, other)),
    }
}
