use crate::domain::ports::Storage;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};

/// 本地目錄存儲，dataset 以子目錄呈現
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }

    fn collect_files(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_files(&path, base, out)?;
            } else if let Ok(relative) = path.strip_prefix(base) {
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.full_path(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full_path, data)?;
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.full_path(prefix.trim_end_matches('/'));
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let base = Path::new(&self.base_path);
        let mut files = Vec::new();
        Self::collect_files(&dir, base, &mut files)?;
        files.sort();
        Ok(files)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let target = self.full_path(prefix.trim_end_matches('/'));
        if target.is_dir() {
            fs::remove_dir_all(target)?;
        } else if target.is_file() {
            fs::remove_file(target)?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.base_path.clone()
    }
}
