use crate::domain::model::{Record, TableData, WriteDisposition};
use crate::domain::ports::Source;
use crate::utils::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 檔案讀取格式。parquet 等二進位格式交由外部工具轉換，不在支援範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Jsonl,
    Csv,
}

/// 符合 glob 的檔案中繼資料，不開啟檔案內容
#[derive(Debug, Clone, Serialize)]
pub struct FileItem {
    pub file_name: String,
    pub path: String,
    pub size_in_bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// 檔案系統 source：目錄 + glob + 讀取格式，產出單一具名表
pub struct FilesystemSource {
    name: String,
    bucket_url: String,
    file_glob: String,
    format: FileFormat,
    primary_key: Option<String>,
    write_disposition: WriteDisposition,
}

impl FilesystemSource {
    pub fn new(
        bucket_url: impl Into<String>,
        file_glob: impl Into<String>,
        format: FileFormat,
    ) -> Self {
        let file_glob = file_glob.into();
        // 預設表名取自 glob 的主檔名部分，with_name 可覆蓋
        let default_name = Path::new(&file_glob)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("files")
            .trim_matches('*')
            .trim_matches('_')
            .to_string();

        Self {
            name: if default_name.is_empty() {
                "files".to_string()
            } else {
                default_name
            },
            bucket_url: bucket_url.into(),
            file_glob,
            format,
            primary_key: None,
            write_disposition: WriteDisposition::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = disposition;
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    fn matched_paths(&self) -> Result<Vec<PathBuf>> {
        let pattern = Path::new(&self.bucket_url)
            .join(&self.file_glob)
            .to_string_lossy()
            .into_owned();

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// 列出符合 glob 的檔案中繼資料
    pub fn files(&self) -> Result<Vec<FileItem>> {
        let mut items = Vec::new();
        for path in self.matched_paths()? {
            let metadata = std::fs::metadata(&path)?;
            let modified = metadata
                .modified()
                .ok()
                .map(|time| DateTime::<Utc>::from(time));
            items.push(FileItem {
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path.to_string_lossy().into_owned(),
                size_in_bytes: metadata.len(),
                modified,
            });
        }
        Ok(items)
    }

    fn read_file_records(&self, path: &Path) -> Result<Vec<Record>> {
        match self.format {
            FileFormat::Jsonl => {
                let bytes = std::fs::read(path)?;
                crate::core::dataset::decode_jsonl(&bytes)
            }
            FileFormat::Csv => {
                let mut reader = csv::Reader::from_path(path)?;
                let headers = reader.headers()?.clone();
                let mut records = Vec::new();
                for row in reader.records() {
                    let row = row?;
                    let mut data = HashMap::new();
                    for (header, field) in headers.iter().zip(row.iter()) {
                        data.insert(header.to_string(), coerce_scalar(field));
                    }
                    records.push(Record { data });
                }
                Ok(records)
            }
        }
    }
}

#[async_trait::async_trait]
impl Source for FilesystemSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn extract(&self) -> Result<Vec<TableData>> {
        let paths = self.matched_paths()?;
        if paths.is_empty() {
            return Err(PipelineError::ExtractError {
                resource: self.name.clone(),
                details: format!(
                    "no files matched '{}' under '{}'",
                    self.file_glob, self.bucket_url
                ),
            });
        }

        let mut records = Vec::new();
        for path in &paths {
            let file_records = self.read_file_records(path)?;
            tracing::debug!(
                "📂 {}: read {} record(s) from {}",
                self.name,
                file_records.len(),
                path.display()
            );
            records.extend(file_records);
        }

        tracing::info!(
            "📂 {}: {} file(s) matched, {} record(s) total",
            self.name,
            paths.len(),
            records.len()
        );

        let mut table =
            TableData::new(self.name.clone(), records).with_disposition(self.write_disposition);
        if let Some(key) = &self.primary_key {
            table = table.with_primary_key(key.clone());
        }
        Ok(vec![table])
    }
}

/// CSV 欄位型別推斷：整數、浮點、布林，其他維持字串，空字串視為 null
fn coerce_scalar(field: &str) -> serde_json::Value {
    if field.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = field.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = field.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(number);
        }
    }
    match field {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_scalar() {
        assert_eq!(coerce_scalar("42"), serde_json::json!(42));
        assert_eq!(coerce_scalar("4.5"), serde_json::json!(4.5));
        assert_eq!(coerce_scalar("true"), serde_json::json!(true));
        assert_eq!(coerce_scalar("hello"), serde_json::json!("hello"));
        assert_eq!(coerce_scalar(""), serde_json::Value::Null);
    }

    #[test]
    fn test_default_name_from_glob() {
        let source = FilesystemSource::new("./data", "*payments.jsonl", FileFormat::Jsonl);
        assert_eq!(source.name(), "payments");

        let trailing = FilesystemSource::new("./drops", "customers_*.csv", FileFormat::Csv);
        assert_eq!(trailing.name(), "customers");

        let renamed = FilesystemSource::new("./data", "*.csv", FileFormat::Csv).with_name("raw");
        assert_eq!(renamed.name(), "raw");
    }
}
