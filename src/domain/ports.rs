use crate::domain::model::TransformResult;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_key(&self) -> &str;
    fn base_url(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    /// 輸出檔名（不含副檔名）
    fn file_stem(&self) -> &str;
    fn compress(&self) -> bool;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Extracted: Send + 'static;

    async fn extract(&self) -> Result<Self::Extracted>;
    async fn transform(&self, data: Self::Extracted) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
