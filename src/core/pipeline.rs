use crate::core::email::extract_body;
use crate::core::json_extract::extract_json_array;
use crate::core::sheet::SheetWriter;
use crate::core::streamer::collect_response;
use crate::core::{ConfigProvider, ModelClient, Pipeline, RecordBatch, Storage};
use crate::utils::error::Result;
use crate::utils::retry::RetryPolicy;
use std::io::Write;

/// Email → model → records → spreadsheet.
pub struct RosterPipeline<S: Storage, M: ModelClient, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) model: M,
    pub(crate) config: C,
}

impl<S: Storage, M: ModelClient, C: ConfigProvider> RosterPipeline<S, M, C> {
    pub fn new(storage: S, model: M, config: C) -> Self {
        Self {
            storage,
            model,
            config,
        }
    }

    fn echo_channel(&self) -> Box<dyn Write + Send> {
        if self.config.echo_stream() {
            Box::new(std::io::stdout())
        } else {
            Box::new(std::io::sink())
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, M: ModelClient, C: ConfigProvider> Pipeline for RosterPipeline<S, M, C> {
    async fn extract(&self) -> Result<String> {
        tracing::debug!("Reading email from {}", self.config.email_path());
        let raw = self.storage.read_file(self.config.email_path()).await?;
        let body = extract_body(&raw)?;
        tracing::debug!("Email body: {} characters", body.chars().count());
        Ok(body)
    }

    async fn transform(&self, body: String) -> Result<RecordBatch> {
        let mut echo = self.echo_channel();

        writeln!(echo, "Generating response...")?;
        let stream = self
            .model
            .generate_stream(self.config.model_name(), &body)
            .await?;
        let full_response = collect_response(stream, &mut echo).await?;
        writeln!(echo, "\n\nComplete response received.")?;

        let values = extract_json_array(&full_response)?;
        RecordBatch::from_values(values)
    }

    async fn load(&self, batch: RecordBatch) -> Result<String> {
        let output_path = self.config.output_path();
        let retry = RetryPolicy::new(self.config.retry_attempts(), self.config.retry_delay());

        let update = SheetWriter::new(&self.storage, retry)
            .write_or_append(output_path, &batch)
            .await?;
        tracing::debug!("Sheet update: {:?}", update);

        Ok(output_path.to_string())
    }
}
