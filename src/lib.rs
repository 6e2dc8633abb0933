use config::Config;
use sqlx::SqlitePool;
use utils::SharedHasher;

pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod session;
pub mod utils;
pub mod workflow;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub hasher: SharedHasher,
}
