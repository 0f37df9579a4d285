use crate::core::dataset::{
    encode_jsonl, infer_table_schema, read_schema_doc, schema_path, table_path, Dataset, SchemaDoc,
};
use crate::core::transformation::TransformationGroup;
use crate::domain::model::{LoadInfo, Record, TableData, TableLoadInfo, WriteDisposition};
use crate::domain::ports::{Source, Storage};
use crate::utils::error::{PipelineError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 載入前的 dataset 重置策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    DropSources,
}

/// Pipeline：具名執行單位，把 source 的表載入目的地 dataset
pub struct Pipeline<S: Storage + Clone> {
    name: String,
    storage: S,
    dataset_name: String,
    refresh: Option<RefreshMode>,
    monitor: SystemMonitor,
}

impl<S: Storage + Clone> Pipeline<S> {
    pub fn new(
        name: impl Into<String>,
        storage: S,
        dataset_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            storage,
            dataset_name: dataset_name.into(),
            refresh: None,
            monitor: SystemMonitor::new(false),
        }
    }

    /// dev_mode：每個 pipeline 實例載入到帶時間戳的新 namespace
    pub fn with_dev_mode(mut self, enabled: bool) -> Self {
        if enabled {
            self.dataset_name = format!(
                "{}_{}",
                self.dataset_name,
                Utc::now().format("%Y%m%d%H%M%S%3f")
            );
        }
        self
    }

    pub fn with_refresh(mut self, mode: RefreshMode) -> Self {
        self.refresh = Some(mode);
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// 取得已載入資料的唯讀視圖
    pub fn dataset(&self) -> Dataset<S> {
        Dataset::attach(self.storage.clone(), self.dataset_name.clone())
    }

    /// pipeline 目前的 schema，與 `dataset().schema()` 指向同一份文件
    pub async fn default_schema(&self) -> Result<SchemaDoc> {
        Ok(read_schema_doc(&self.storage, &self.dataset_name)
            .await?
            .unwrap_or_else(|| SchemaDoc::new(self.dataset_name.clone())))
    }

    /// 執行 source 群組：全部抽取完成後才寫入目的地
    pub async fn run(&self, sources: &[&dyn Source]) -> Result<LoadInfo> {
        let started_at = Utc::now();
        self.monitor.log_stats("Pipeline run started");
        tracing::info!(
            "🚀 {}: running {} source(s) into dataset '{}'",
            self.name,
            sources.len(),
            self.dataset_name
        );

        if self.refresh == Some(RefreshMode::DropSources) {
            tracing::info!("🧹 {}: dropping dataset '{}'", self.name, self.dataset_name);
            self.storage
                .delete_prefix(&format!("{}/", self.dataset_name))
                .await?;
        }

        // Extract 階段全部成功才進入 Load，任何 source 失敗時目的地不變
        let mut tables = Vec::new();
        for source in sources {
            let extracted = source.extract().await?;
            tracing::info!(
                "📥 {}: source '{}' produced {} table(s)",
                self.name,
                source.name(),
                extracted.len()
            );
            tables.extend(extracted);
        }

        let info = self.load_tables(tables, started_at).await?;
        self.monitor.log_stats("Pipeline run finished");
        Ok(info)
    }

    /// 執行 transformation 群組：單一交易，任何一步失敗就不寫入
    pub async fn run_transformations(
        &self,
        group: &TransformationGroup<S>,
        input: &Dataset<S>,
    ) -> Result<LoadInfo> {
        let started_at = Utc::now();
        tracing::info!(
            "🔄 {}: running transformation group '{}' ({} step(s))",
            self.name,
            group.name(),
            group.steps().len()
        );

        let mut tables = Vec::new();
        for step in group.steps() {
            let records = step.run(input).await.map_err(|e| {
                PipelineError::TransformationError {
                    name: step.name().to_string(),
                    details: e.to_string(),
                }
            })?;
            tracing::debug!(
                "🔄 {}: step '{}' produced {} record(s)",
                self.name,
                step.name(),
                records.len()
            );
            tables.push(
                TableData::new(step.name().to_string(), records)
                    .with_disposition(step.write_disposition()),
            );
        }

        self.load_tables(tables, started_at).await
    }

    /// Load 階段：所有表的最終內容先在記憶體組好，再一次寫出
    async fn load_tables(
        &self,
        tables: Vec<TableData>,
        started_at: chrono::DateTime<Utc>,
    ) -> Result<LoadInfo> {
        let doc = read_schema_doc(&self.storage, &self.dataset_name).await?;
        let first_run = doc.is_none();
        let mut doc = doc.unwrap_or_else(|| SchemaDoc::new(self.dataset_name.clone()));

        let mut staged: HashMap<String, Vec<Record>> = HashMap::new();
        let mut table_infos = Vec::new();

        for table in tables {
            let rows_loaded = table.records.len();

            // 同一次執行中重複的表名以已暫存的內容為基底
            let existing = match staged.remove(&table.name) {
                Some(records) => records,
                None => self.read_existing(&table.name).await?,
            };

            let final_records = match table.write_disposition {
                WriteDisposition::Replace => table.records,
                WriteDisposition::Append => {
                    let mut merged = existing;
                    merged.extend(table.records);
                    merged
                }
                WriteDisposition::Merge => match &table.primary_key {
                    Some(key) => merge_records(existing, table.records, key),
                    None => {
                        tracing::warn!(
                            "🔶 {}: merge disposition without primary_key for '{}', appending",
                            self.name,
                            table.name
                        );
                        let mut merged = existing;
                        merged.extend(table.records);
                        merged
                    }
                },
            };

            doc.merge_table(&table.name, infer_table_schema(&final_records));
            table_infos.push(TableLoadInfo {
                table: table.name.clone(),
                rows_loaded,
                write_disposition: table.write_disposition,
            });
            staged.insert(table.name, final_records);
        }

        for (table, records) in &staged {
            let path = table_path(&self.dataset_name, table);
            self.storage
                .write_file(&path, &encode_jsonl(records)?)
                .await?;
            tracing::debug!("💾 {}: wrote {}", self.name, path);
        }
        self.storage
            .write_file(
                &schema_path(&self.dataset_name),
                &serde_json::to_vec_pretty(&doc)?,
            )
            .await?;

        table_infos.sort_by(|a, b| a.table.cmp(&b.table));
        let info = LoadInfo {
            pipeline_name: self.name.clone(),
            dataset_name: self.dataset_name.clone(),
            destination: self.storage.location(),
            first_run,
            started_at,
            finished_at: Utc::now(),
            tables: table_infos,
        };

        tracing::info!(
            "✅ {}: loaded {} row(s) across {} table(s)",
            self.name,
            info.total_rows(),
            info.tables.len()
        );
        Ok(info)
    }

    async fn read_existing(&self, table: &str) -> Result<Vec<Record>> {
        match self
            .storage
            .read_file(&table_path(&self.dataset_name, table))
            .await
        {
            Ok(bytes) => crate::core::dataset::decode_jsonl(&bytes),
            Err(PipelineError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// merge 模式：以 primary key 更新既有記錄，其餘追加，維持原始順序
fn merge_records(existing: Vec<Record>, incoming: Vec<Record>, primary_key: &str) -> Vec<Record> {
    let mut merged = existing;
    let mut index: HashMap<String, usize> = HashMap::new();
    for (position, record) in merged.iter().enumerate() {
        if let Some(value) = record.get(primary_key) {
            index.insert(value.to_string(), position);
        }
    }

    for record in incoming {
        match record.get(primary_key).map(|v| v.to_string()) {
            Some(key) => match index.get(&key) {
                Some(&position) => merged[position] = record,
                None => {
                    index.insert(key, merged.len());
                    merged.push(record);
                }
            },
            None => merged.push(record),
        }
    }

    merged
}
