use std::sync::Arc;

use sqlx::PgPool;

pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod models;
pub mod permissions;
pub mod services;
pub mod web;

pub use config::Config;
pub use error::{ActionResult, AppError};
pub use web::build_router;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub fn offer_window(&self) -> chrono::Duration {
        self.config.offer_window()
    }
}
