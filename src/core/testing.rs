//! Test doubles shared by the pipeline unit tests.

use crate::domain::ports::{ConfigProvider, Storage};
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MockStorage {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned()
    }
}

impl Storage for MockStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let files = self.files.lock().await;
        files.get(path).cloned().ok_or_else(|| {
            EtlError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path),
            ))
        })
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().await;
        files.insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

pub struct MockConfig {
    base_url: String,
    output_formats: Vec<String>,
    compress: bool,
}

impl MockConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            output_formats: vec!["csv".to_string()],
            compress: false,
        }
    }

    pub fn with_formats(mut self, formats: &[&str]) -> Self {
        self.output_formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

impl ConfigProvider for MockConfig {
    fn api_key(&self) -> &str {
        "demo"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timeout_seconds(&self) -> u64 {
        5
    }

    fn output_path(&self) -> &str {
        "test_output"
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn file_stem(&self) -> &str {
        "prices"
    }

    fn compress(&self) -> bool {
        self.compress
    }
}
