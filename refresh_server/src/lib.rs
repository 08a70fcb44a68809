// src/lib.rs

pub mod handlers;
pub mod models;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use handlers::{health_check, refresh_data, RefreshState};
use tracing::info;

pub const DEFAULT_ADDR: &str = "127.0.0.1:5000";
pub const ADDR_VAR: &str = "REFRESH_SERVER_ADDR";

/// Bind address, `REFRESH_SERVER_ADDR` or the local default.
pub fn server_addr<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ADDR_VAR)
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(refresh_data).service(health_check);
}

pub async fn run_server(addr: &str, state: RefreshState) -> std::io::Result<()> {
    let state = web::Data::new(state);

    info!("Starting refresh server at http://{}", addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(addr)?
    .run()
    .await
}
