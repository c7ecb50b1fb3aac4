use std::sync::Arc;

use tracing::error;

use conecta_db::Database;

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::mailer::Mailer;
use crate::storage::Storage;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub config: AppConfig,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Storage,
}

impl AppStateInner {
    pub fn new(db: Database, config: AppConfig, mailer: Arc<dyn Mailer>, storage: Storage) -> AppState {
        Arc::new(Self {
            db,
            config,
            mailer,
            storage,
        })
    }

    /// Runs blocking database work off the async runtime. Rule violations
    /// raised inside `f` come back as the matching `ApiError`.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.into())
            })?
            .map_err(ApiError::from)
    }
}
