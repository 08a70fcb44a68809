// src/models.rs

use data_pipeline::PipelineResult;
use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "Data refreshed successfully";
pub const EMPTY_MESSAGE: &str = "Pipeline returned empty data";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: RefreshStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PipelineResult>,
}

impl RefreshResponse {
    pub fn success(result: PipelineResult) -> Self {
        RefreshResponse {
            status: RefreshStatus::Success,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(result),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RefreshResponse {
            status: RefreshStatus::Error,
            message: message.into(),
            data: None,
        }
    }
}
