//! # Document storage
//!
//! Redis when `REDIS_URL` is set, otherwise an in-process store.
//!
//! - Redis keeps every collection as one hash of JSON documents, see [`store::remote`]
//! - The in-process store is lost on restart and is meant for local development
use std::sync::Arc;

use store::{Database, MemoryBackend, RedisBackend, StoreError};
use tracing::{info, warn};

use crate::config::Config;

pub async fn init_database(config: &Config) -> Result<Database, StoreError> {
    match &config.redis_url {
        Some(redis_url) => {
            info!("Connecting to redis...");
            let backend = RedisBackend::connect(redis_url).await?;

            Ok(Database::new(Arc::new(backend)))
        }
        None => {
            warn!("REDIS_URL not set, documents will only live in memory");

            Ok(Database::new(Arc::new(MemoryBackend::new())))
        }
    }
}
