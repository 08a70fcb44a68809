// src/handlers.rs

use crate::models::{RefreshResponse, EMPTY_MESSAGE};
use actix_web::{get, post, web, HttpResponse, Responder};
use data_pipeline::{run_pipeline, PipelineConfig, PipelineError, PipelineResult};
use std::sync::Arc;
use tracing::{error, info};

pub type PipelineRunner = dyn Fn() -> Result<PipelineResult, PipelineError> + Send + Sync;

/// Shared by all workers. Runs the pipeline synchronously on the blocking pool.
#[derive(Clone)]
pub struct RefreshState {
    runner: Arc<PipelineRunner>,
}

impl RefreshState {
    pub fn new<F>(runner: F) -> Self
    where
        F: Fn() -> Result<PipelineResult, PipelineError> + Send + Sync + 'static,
    {
        RefreshState { runner: Arc::new(runner) }
    }

    /// Live Yahoo Finance runs with the given configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self::new(move || run_pipeline(config.clone()))
    }
}

#[post("/refresh_data")]
pub async fn refresh_data(state: web::Data<RefreshState>) -> impl Responder {
    info!("Received request to refresh data");

    // Overlapping requests each run their own pipeline and the last writer wins
    let runner = Arc::clone(&state.runner);
    match web::block(move || runner()).await {
        Ok(Ok(result)) if result.is_empty() => {
            error!("Refresh failed: {}", EMPTY_MESSAGE);
            HttpResponse::InternalServerError().json(RefreshResponse::error(EMPTY_MESSAGE))
        }
        Ok(Ok(result)) => {
            info!(
                "Refresh finished with {} tickers and {} history rows",
                result.fundamentals.len(),
                result.history.len()
            );
            HttpResponse::Ok().json(RefreshResponse::success(result))
        }
        Ok(Err(err)) => {
            error!("Refresh failed: {}", err);
            HttpResponse::InternalServerError().json(RefreshResponse::error(err.to_string()))
        }
        Err(err) => {
            error!("Refresh task did not complete: {}", err);
            HttpResponse::InternalServerError().json(RefreshResponse::error(err.to_string()))
        }
    }
}

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("OK")
}
