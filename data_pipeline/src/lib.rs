// src/lib.rs

pub mod cache;
pub mod config;
pub mod error;
pub mod fundamentals;
pub mod history;
pub mod models;
pub mod performance;
pub mod pipeline;
pub mod provider;
pub mod utils;
pub mod yahoo;

pub use config::PipelineConfig;
pub use error::{PipelineError, ProviderError};
pub use models::PipelineResult;
pub use pipeline::{run_pipeline, Pipeline};
