pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod directory;

#[cfg(test)]
pub(crate) mod test_utils;

pub use db::DbPool;

use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::directory::{SqliteUserDirectory, UserDirectory};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub users: Arc<dyn UserDirectory>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let users = Arc::new(SqliteUserDirectory::new(db.clone()));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        Self {
            config,
            db,
            users,
            rate_limiter,
        }
    }
}
