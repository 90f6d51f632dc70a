use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::engine::RegistrationEngine;
use crate::store::{EventStore, PgEventStore};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub store: Arc<dyn EventStore>,
    pub engine: RegistrationEngine,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool.clone()));
        Self {
            pool,
            engine: RegistrationEngine::new(store.clone()),
            store,
            config: Arc::new(config),
        }
    }
}
