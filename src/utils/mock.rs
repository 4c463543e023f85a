use std::path::{Path, PathBuf};

use tempfile::{Builder, TempDir};

use crate::{
    config::StorageConfig,
    storage::storage_manager::StorageManager,
    types::error::{DatabaseError, Result},
};

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A throwaway database directory, removed on drop.
pub struct TempDatabase {
    pub dir: TempDir,
    pub page_size: usize,
    pub storage_manager: Option<StorageManager>,
}

impl TempDatabase {
    pub fn new() -> Result<Self> {
        Self::with_prefix("lumbung_test_")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        init_test_logger();
        let dir = Builder::new().prefix(prefix).tempdir()?;
        Ok(Self {
            dir,
            page_size: StorageConfig::default().page_size,
            storage_manager: None,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A file path inside the temporary directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config(&self) -> StorageConfig {
        StorageConfig::in_dir(self.dir.path()).with_page_size(self.page_size)
    }

    pub fn create_storage_manager(&mut self) -> Result<&mut StorageManager> {
        let sm = StorageManager::open(self.config())?;
        self.storage_manager = Some(sm);
        self.get_storage_manager().ok_or_else(|| DatabaseError::InvalidData {
            details: "Storage manager was not kept".to_string(),
        })
    }

    pub fn get_storage_manager(&mut self) -> Option<&mut StorageManager> {
        self.storage_manager.as_mut()
    }

    /// Close the current storage manager, if any, and open a fresh one on
    /// the same directory.
    pub fn reopen(&mut self) -> Result<&mut StorageManager> {
        self.storage_manager = None;
        self.create_storage_manager()
    }
}
