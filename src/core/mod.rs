pub mod email;
pub mod etl;
pub mod json_extract;
pub mod pipeline;
pub mod sheet;
pub mod streamer;

pub use crate::domain::model::{RecordBatch, TransactionRecord, COLUMNS};
pub use crate::domain::ports::{ConfigProvider, ModelClient, Pipeline, Storage};
pub use crate::utils::error::Result;
