use crate::domain::model::Record;
use crate::domain::ports::Storage;
use crate::utils::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dataset 目錄下的 schema 文件檔名，底線開頭避免與資料表衝突
pub const SCHEMA_FILE: &str = "_schema.json";

pub(crate) fn table_path(dataset: &str, table: &str) -> String {
    format!("{}/{}.jsonl", dataset, table)
}

pub(crate) fn schema_path(dataset: &str) -> String {
    format!("{}/{}", dataset, SCHEMA_FILE)
}

/// 單張表的欄位描述。BTreeMap 保證序列化順序穩定，version_hash 才有意義
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: BTreeMap<String, String>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }
}

/// 整個 dataset 的 schema 文件，由 pipeline 在每次載入後更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDoc {
    pub dataset: String,
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaDoc {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            tables: BTreeMap::new(),
        }
    }

    /// schema 的內容雜湊。pipeline 與 dataset 兩邊相等代表 schema 一致
    pub fn version_hash(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }

    /// 併入一張表的推導結果，已存在的欄位型別衝突時放寬
    pub fn merge_table(&mut self, table: &str, inferred: TableSchema) {
        let entry = self.tables.entry(table.to_string()).or_default();
        for (column, new_type) in inferred.columns {
            match entry.columns.get(&column) {
                None => {
                    entry.columns.insert(column, new_type);
                }
                Some(existing) if *existing == new_type => {}
                Some(existing) => {
                    let widened = widen_type(existing, &new_type);
                    entry.columns.insert(column, widened);
                }
            }
        }
    }
}

fn widen_type(a: &str, b: &str) -> String {
    if (a == "bigint" && b == "double") || (a == "double" && b == "bigint") {
        "double".to_string()
    } else {
        "text".to_string()
    }
}

pub(crate) fn value_type(value: &serde_json::Value) -> Option<&'static str> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(_) => Some("bool"),
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some("bigint")
            } else {
                Some("double")
            }
        }
        serde_json::Value::String(_) => Some("text"),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => Some("complex"),
    }
}

pub(crate) fn infer_table_schema(records: &[Record]) -> TableSchema {
    let mut schema = TableSchema::default();
    for record in records {
        for (field, value) in &record.data {
            let Some(new_type) = value_type(value) else {
                continue;
            };
            match schema.columns.get(field) {
                None => {
                    schema.columns.insert(field.clone(), new_type.to_string());
                }
                Some(existing) if existing == new_type => {}
                Some(existing) => {
                    let widened = widen_type(existing, new_type);
                    schema.columns.insert(field.clone(), widened);
                }
            }
        }
    }
    schema
}

pub(crate) fn encode_jsonl(records: &[Record]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for record in records {
        serde_json::to_writer(&mut out, &record.data)?;
        out.push(b'\n');
    }
    Ok(out)
}

pub(crate) fn decode_jsonl(bytes: &[u8]) -> Result<Vec<Record>> {
    let text = String::from_utf8_lossy(bytes);
    let mut records = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let data: std::collections::HashMap<String, serde_json::Value> =
            serde_json::from_str(line)?;
        records.push(Record { data });
    }
    Ok(records)
}

pub(crate) async fn read_schema_doc<S: Storage>(
    storage: &S,
    dataset: &str,
) -> Result<Option<SchemaDoc>> {
    match storage.read_file(&schema_path(dataset)).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(PipelineError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// 已載入資料的唯讀視圖，對應腳本的 Review 階段
pub struct Dataset<S: Storage> {
    storage: S,
    name: String,
}

impl<S: Storage> Dataset<S> {
    pub fn attach(storage: S, name: impl Into<String>) -> Self {
        Self {
            storage,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn schema(&self) -> Result<SchemaDoc> {
        read_schema_doc(&self.storage, &self.name)
            .await?
            .ok_or_else(|| PipelineError::DatasetError {
                message: format!("dataset '{}' has no schema document", self.name),
            })
    }

    pub async fn version_hash(&self) -> Result<String> {
        Ok(self.schema().await?.version_hash())
    }

    /// 資料表名稱列表，以 schema 文件為準，缺少時退回目錄列表
    pub async fn tables(&self) -> Result<Vec<String>> {
        if let Some(doc) = read_schema_doc(&self.storage, &self.name).await? {
            return Ok(doc.tables.keys().cloned().collect());
        }

        let prefix = format!("{}/", self.name);
        let mut tables: Vec<String> = self
            .storage
            .list_files(&prefix)
            .await?
            .into_iter()
            .filter_map(|path| {
                let file = path.strip_prefix(&prefix)?;
                if file.starts_with('_') {
                    return None;
                }
                file.strip_suffix(".jsonl").map(|t| t.to_string())
            })
            .collect();
        tables.sort();
        Ok(tables)
    }

    /// 取得指定資料表的 Relation
    pub async fn table(&self, table: &str) -> Result<Relation> {
        let bytes = match self.storage.read_file(&table_path(&self.name, table)).await {
            Ok(bytes) => bytes,
            Err(PipelineError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::DatasetError {
                    message: format!("table '{}' not found in dataset '{}'", table, self.name),
                });
            }
            Err(e) => return Err(e),
        };
        let records = decode_jsonl(&bytes)?;

        let schema = match read_schema_doc(&self.storage, &self.name).await? {
            Some(doc) => doc.tables.get(table).cloned().unwrap_or_default(),
            None => infer_table_schema(&records),
        };

        Ok(Relation {
            name: table.to_string(),
            schema,
            records,
        })
    }

    pub async fn row_counts(&self) -> Result<Vec<(String, usize)>> {
        let mut counts = Vec::new();
        for table in self.tables().await? {
            let relation = self.table(&table).await?;
            counts.push((table, relation.row_count()));
        }
        Ok(counts)
    }
}

/// Dataset 中一張資料表的參照
pub struct Relation {
    name: String,
    schema: TableSchema,
    records: Vec<Record>,
}

impl Relation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn columns(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn rows(&self) -> &[Record] {
        &self.records
    }

    pub fn head(&self, n: usize) -> &[Record] {
        &self.records[..self.records.len().min(n)]
    }
}
