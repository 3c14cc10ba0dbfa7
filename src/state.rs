// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, ingest::document::DocumentConverter, storage::DocumentStorage};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub storage: DocumentStorage,
    pub converter: Arc<dyn DocumentConverter>,
    /// Outbound client for identity provider calls.
    pub http: reqwest::Client,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for DocumentStorage {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}
