//! Storage configuration.
//!
//! Defaults match the on-disk layout a fresh checkout expects:
//! - data_dir = data/user_data (user table and index files)
//! - catalog_dir = data/catalog (system table files)
//! - page_size = 512
//!
//! Every field can be overridden from the environment or with the `with_*`
//! setters.

use std::path::PathBuf;

use crate::types::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
    error::{DatabaseError, Result},
};

pub const ENV_DATA_DIR: &str = "LUMBUNG_DATA_DIR";
pub const ENV_CATALOG_DIR: &str = "LUMBUNG_CATALOG_DIR";
pub const ENV_PAGE_SIZE: &str = "LUMBUNG_PAGE_SIZE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding `<table>.tbl` and `<table>_<column>.idx` files.
    /// Env: LUMBUNG_DATA_DIR
    pub data_dir: PathBuf,

    /// Directory holding the two catalog tables.
    /// Env: LUMBUNG_CATALOG_DIR
    pub catalog_dir: PathBuf,

    /// Page size in bytes, shared by every file the engine opens.
    /// Env: LUMBUNG_PAGE_SIZE (power of two, 512..=32768)
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data").join("user_data"),
            catalog_dir: PathBuf::from("data").join("catalog"),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorageConfig {
    /// Configuration with both directories under `root`.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("user_data"),
            catalog_dir: root.join("catalog"),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Load configuration from the process environment. Unset or unparsable
    /// variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StorageConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_DATA_DIR) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.data_dir = PathBuf::from(s);
            }
        }

        if let Some(v) = lookup(ENV_CATALOG_DIR) {
            let s = v.trim();
            if !s.is_empty() {
                cfg.catalog_dir = PathBuf::from(s);
            }
        }

        if let Some(v) = lookup(ENV_PAGE_SIZE) {
            match v.trim().parse::<usize>() {
                Ok(n) => cfg.page_size = n,
                Err(_) => log::warn!("Ignoring unparsable {}={:?}", ENV_PAGE_SIZE, v),
            }
        }

        cfg
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_catalog_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.catalog_dir = dir.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_page_size(self.page_size)?;
        if self.data_dir == self.catalog_dir {
            return Err(DatabaseError::InvalidConfig {
                details: format!(
                    "data_dir and catalog_dir must differ (both {})",
                    self.data_dir.display()
                ),
            });
        }
        Ok(())
    }
}

pub fn validate_page_size(page_size: usize) -> Result<()> {
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(DatabaseError::InvalidPageSize(page_size));
    }
    Ok(())
}
