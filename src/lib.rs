pub mod art;
pub mod config;
pub mod storage;
pub mod types;
pub mod utils;
