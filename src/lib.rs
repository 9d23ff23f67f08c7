pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    Router,
    routing::{get, post},
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::adapters::{PostgresProductStock, PostgresTransactionStore};
use crate::config::Config;
use crate::ports::{ProductStock, TransactionStore};
use crate::services::{RecoveryScheduler, TransactionLifecycle};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub scheduler: Arc<RecoveryScheduler>,
}

/// Wire the Postgres-backed lifecycle engine and its recovery scheduler.
pub fn build_scheduler(pool: &PgPool, config: &Config) -> Arc<RecoveryScheduler> {
    let store: Arc<dyn TransactionStore> = Arc::new(PostgresTransactionStore::new(pool.clone()));
    let products: Arc<dyn ProductStock> = Arc::new(PostgresProductStock::new(pool.clone()));
    let lifecycle = Arc::new(TransactionLifecycle::new(store.clone(), products));

    Arc::new(RecoveryScheduler::new(
        lifecycle,
        store,
        Duration::from_secs(config.sweep_interval_secs),
        config.sweep_max_age_hours,
    ))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/scheduler/pending", get(handlers::pending_stats))
        .route("/scheduler/run", post(handlers::trigger_sweep))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
