//! # Redis
//!
//! Document storage on a shared redis instance.
//!
//! ## Layout
//!
//! - One hash per collection: `sharewear:<collection>`, field is the document id, value is the JSON document
//! - One hash per unique index: `sharewear:index:<index>`, field is the unique key, value is the owning id
//! - Listing a collection is a single `HVALS`, fine for a marketplace of this size
//!
//! ## Atomicity
//!
//! - Claims use `HSETNX`, so two registrations with the same email cannot both win
//! - Updates go through a small Lua script that only writes when the stored JSON still matches what was read
//! - Redis runs scripts atomically, so a compare-and-swap never interleaves with another write
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tracing::info;

use crate::{backend::Backend, error::StoreError};

const PREFIX: &str = "sharewear";

const SWAP_SCRIPT: &str = r#"
    local current = redis.call('HGET', KEYS[1], ARGV[1])
    if current == ARGV[2] then
        redis.call('HSET', KEYS[1], ARGV[1], ARGV[3])
        return 1
    end
    return 0
"#;

pub struct RedisBackend {
    connection: ConnectionManager,
    swap: Script,
}

impl RedisBackend {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(3)
            .set_connection_timeout(Duration::from_secs(2));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        info!("Connected to redis");

        Ok(Self {
            connection,
            swap: Script::new(SWAP_SCRIPT),
        })
    }
}

fn collection_key(collection: &str) -> String {
    format!("{PREFIX}:{collection}")
}

fn index_key(index: &str) -> String {
    format!("{PREFIX}:index:{index}")
}

#[async_trait]
impl Backend for RedisBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        let document: Option<String> = connection.hget(collection_key(collection), id).await?;

        Ok(document)
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let mut connection = self.connection.clone();
        let documents: Vec<String> = connection.hvals(collection_key(collection)).await?;

        Ok(documents)
    }

    async fn insert(&self, collection: &str, id: &str, json: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.hset(collection_key(collection), id, json).await?;

        Ok(())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let swapped: i64 = self
            .swap
            .key(collection_key(collection))
            .arg(id)
            .arg(expected)
            .arg(new)
            .invoke_async(&mut connection)
            .await?;

        Ok(swapped == 1)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let removed: i64 = connection.hdel(collection_key(collection), id).await?;

        Ok(removed > 0)
    }

    async fn claim(&self, index: &str, key: &str, owner: &str) -> Result<bool, StoreError> {
        let mut connection = self.connection.clone();
        let claimed: bool = connection.hset_nx(index_key(index), key, owner).await?;

        Ok(claimed)
    }

    async fn release(&self, index: &str, key: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: () = connection.hdel(index_key(index), key).await?;

        Ok(())
    }

    async fn owner(&self, index: &str, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        let owner: Option<String> = connection.hget(index_key(index), key).await?;

        Ok(owner)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(())
    }
}
