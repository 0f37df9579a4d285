use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 單筆記錄：欄位名稱對應 JSON 值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn from_object(obj: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data: obj.into_iter().collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.data.get(field)
    }
}

/// 寫入模式，對應 resource 的 write_disposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    #[default]
    Append,
    Replace,
    Merge,
}

impl fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::Replace => write!(f, "replace"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Source 抽取出的一張具名表
#[derive(Debug, Clone)]
pub struct TableData {
    pub name: String,
    pub records: Vec<Record>,
    pub write_disposition: WriteDisposition,
    pub primary_key: Option<String>,
}

impl TableData {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            write_disposition: WriteDisposition::default(),
            primary_key: None,
        }
    }

    pub fn with_disposition(mut self, disposition: WriteDisposition) -> Self {
        self.write_disposition = disposition;
        self
    }

    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }
}

/// 單張表的載入結果
#[derive(Debug, Clone, Serialize)]
pub struct TableLoadInfo {
    pub table: String,
    pub rows_loaded: usize,
    pub write_disposition: WriteDisposition,
}

/// `Pipeline::run` 的執行摘要，腳本結尾直接列印
#[derive(Debug, Clone, Serialize)]
pub struct LoadInfo {
    pub pipeline_name: String,
    pub dataset_name: String,
    pub destination: String,
    pub first_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableLoadInfo>,
}

impl LoadInfo {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows_loaded).sum()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for LoadInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pipeline {} load step completed in {}ms",
            self.pipeline_name,
            self.duration().num_milliseconds()
        )?;
        writeln!(
            f,
            "{} table(s) loaded to dataset '{}' at {}{}",
            self.tables.len(),
            self.dataset_name,
            self.destination,
            if self.first_run { " (first run)" } else { "" }
        )?;
        for table in &self.tables {
            writeln!(
                f,
                "  - {}: {} row(s) [{}]",
                table.table, table.rows_loaded, table.write_disposition
            )?;
        }
        Ok(())
    }
}
