use crate::domain::model::{Record, TableData};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 目的地的底層存儲。路徑一律使用相對於根目錄的 `/` 分隔形式
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
    /// 列出 prefix 底下的所有檔案（遞迴），不存在時回傳空列表
    async fn list_files(&self, prefix: &str) -> Result<Vec<String>>;
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;

    /// 顯示在載入摘要中的目的地描述
    fn location(&self) -> String {
        "storage".to_string()
    }
}

/// 一個 Source 產出一或多張具名表
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Vec<TableData>>;
}

/// 對 Dataset 的操作，產出一張新表。由 `TransformationGroup` 以單一交易執行
#[async_trait]
pub trait Transformation<S: Storage>: Send + Sync {
    fn name(&self) -> &str;

    fn write_disposition(&self) -> crate::domain::model::WriteDisposition {
        crate::domain::model::WriteDisposition::Replace
    }

    async fn run(&self, dataset: &crate::core::dataset::Dataset<S>) -> Result<Vec<Record>>;
}
