use crate::core::Pipeline;
use crate::utils::error::{EtlError, Result};

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    /// Runs extract → transform → load. Returns `Ok(None)` when the model
    /// response held no usable JSON; every other failure is returned as an error.
    pub async fn run(&self) -> Result<Option<String>> {
        tracing::info!("🚀 Starting roster extraction");

        // Extract
        let body = self.pipeline.extract().await?;
        tracing::info!("📧 Email body extracted ({} characters)", body.chars().count());

        // Transform
        let batch = match self.pipeline.transform(body).await {
            Ok(batch) => batch,
            Err(e @ EtlError::ExtractionError { .. }) => {
                tracing::error!("❌ Error parsing response as JSON: {}", e);
                eprintln!("Error parsing response as JSON: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        tracing::info!("🔄 Parsed {} transaction records", batch.len());

        // Load
        let output_path = self.pipeline.load(batch).await?;
        tracing::info!("📁 Output saved to: {}", output_path);

        Ok(Some(output_path))
    }
}
