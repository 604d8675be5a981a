use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::Path;

/// 本機磁碟上某個目錄下的檔案
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = Path::new(&self.base_path).join(path);
        Ok(tokio::fs::read(full_path).await?)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("nested").to_str().unwrap().to_string();
        let storage = LocalStorage::new(base);

        storage
            .write_file("out/providers.csv", b"name\nClinic\n")
            .await
            .unwrap();

        let data = storage.read_file("out/providers.csv").await.unwrap();
        assert_eq!(data, b"name\nClinic\n");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        let err = storage.read_file("missing.csv").await.unwrap_err();
        assert!(matches!(err, crate::utils::error::HarvestError::IoError(_)));
    }
}
