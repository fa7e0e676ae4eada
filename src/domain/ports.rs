use crate::domain::model::RecordBatch;
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn email_path(&self) -> &str;
    fn output_path(&self) -> &str;
    fn model_name(&self) -> &str;
    fn model_endpoint(&self) -> &str;
    fn retry_attempts(&self) -> usize;
    fn retry_delay(&self) -> Duration;
    fn echo_stream(&self) -> bool;
}

/// Text fragments of one model response, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate_stream(&self, model: &str, prompt: &str) -> Result<FragmentStream>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Plain-text body of the input email.
    async fn extract(&self) -> Result<String>;
    async fn transform(&self, body: String) -> Result<RecordBatch>;
    async fn load(&self, batch: RecordBatch) -> Result<String>;
}
