pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use services::persistence::{MemoryRecordStore, PgRecordStore, RecordStore, WriteBehind};
use services::ReservationService;
use store::ReservationStore;

// Shared state для всего приложения
pub struct AppState {
    pub service: ReservationService,
    pub config: config::Config,
}

impl AppState {
    /// Connects the record store named by the config (PostgreSQL when
    /// `DATABASE_URL` is set, memory otherwise) and starts the persistence
    /// worker. The returned handle finishes once the state is dropped and the
    /// queue is drained.
    pub async fn new(config: config::Config) -> anyhow::Result<(Arc<Self>, JoinHandle<()>)> {
        let records: Arc<dyn RecordStore> = match config.database.url.as_deref() {
            Some(url) => {
                let db = database::Database::connect(url, &config.database).await?;
                info!("Database connected");
                db.run_migrations().await?;
                Arc::new(PgRecordStore::new(db))
            }
            None => {
                warn!("DATABASE_URL is not set, records are kept in memory only");
                Arc::new(MemoryRecordStore::new())
            }
        };

        Ok(Self::with_record_store(config, records))
    }

    pub fn with_record_store(
        config: config::Config,
        records: Arc<dyn RecordStore>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (writer, worker) = WriteBehind::spawn(records, config.persistence.queue_capacity);
        let service = ReservationService::new(Arc::new(ReservationStore::new()), writer);
        (Arc::new(Self { service, config }), worker)
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Train Tickets API v1.0" }))
        .route("/health", get(health))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let (users, tickets) = state.service.counts();
    Json(json!({
        "status": "OK",
        "users": users,
        "tickets": tickets,
        "persistence": state.service.persistence_stats(),
    }))
}
