use std::sync::Arc;

use sqlx::PgPool;

use rollcall_config::{CorsConfig, JwtConfig, ServerConfig, StorageConfig};
use rollcall_core::{FileStorage, LocalFileStorage};
use rollcall_db::{DbInitError, init_db_pool};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub jwt_config: JwtConfig,
    pub cors_config: CorsConfig,
    pub server_config: ServerConfig,
    pub storage_config: StorageConfig,
    pub storage: Arc<dyn FileStorage>,
}

impl AppState {
    /// Builds state around an existing pool, reading everything else from the environment.
    pub fn from_pool(db: PgPool) -> Self {
        let storage_config = StorageConfig::from_env();
        let storage = Arc::new(LocalFileStorage::with_max_size(
            storage_config.upload_dir.clone(),
            storage_config.max_evidence_bytes,
        ));

        Self {
            db,
            jwt_config: JwtConfig::from_env(),
            cors_config: CorsConfig::from_env(),
            server_config: ServerConfig::from_env(),
            storage_config,
            storage,
        }
    }
}

pub async fn init_app_state() -> Result<AppState, DbInitError> {
    let db = init_db_pool().await?;
    Ok(AppState::from_pool(db))
}
