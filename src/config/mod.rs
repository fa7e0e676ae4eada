pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::time::Duration;

pub const DEFAULT_EMAIL_PATH: &str = "Sample-4.eml";
pub const DEFAULT_OUTPUT_PATH: &str = "Output.xlsx";
pub const DEFAULT_MODEL: &str = "mario";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_RETRY_ATTEMPTS: usize = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "roster-etl")]
#[command(about = "Extract provider roster transactions from an email into a spreadsheet")]
pub struct CliConfig {
    /// Email (.eml) to process
    #[arg(long, default_value = DEFAULT_EMAIL_PATH)]
    pub email: String,

    /// Spreadsheet to create or append to
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output: String,

    /// Model name to generate with
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the model service
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Attempts when the output file is locked
    #[arg(long, default_value_t = DEFAULT_RETRY_ATTEMPTS)]
    pub retry_attempts: usize,

    /// Pause between locked-file attempts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Do not echo model output while it streams
    #[arg(long)]
    pub quiet: bool,

    /// Load settings from a TOML file instead of flags
    #[arg(long)]
    pub config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn email_path(&self) -> &str {
        &self.email
    }

    fn output_path(&self) -> &str {
        &self.output
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn model_endpoint(&self) -> &str {
        &self.endpoint
    }

    fn retry_attempts(&self) -> usize {
        self.retry_attempts
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn echo_stream(&self) -> bool {
        !self.quiet
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_settings(self)
    }
}

/// Checks shared by every configuration source.
pub fn validate_settings<C: crate::core::ConfigProvider + ?Sized>(
    config: &C,
) -> crate::utils::error::Result<()> {
    use crate::utils::validation::*;

    validate_path("input.email_path", config.email_path())?;
    validate_path("output.path", config.output_path())?;
    validate_file_extension("output.path", config.output_path(), &["xlsx"])?;
    validate_non_empty_string("model.name", config.model_name())?;
    validate_url("model.endpoint", config.model_endpoint())?;
    validate_range("output.retry_attempts", config.retry_attempts(), 1, 10)?;
    Ok(())
}
