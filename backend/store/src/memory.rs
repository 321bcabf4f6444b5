use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;

use crate::{backend::Backend, error::StoreError};

#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, String>>,
    indexes: HashMap<String, HashMap<String, String>>,
}

/// Process-local backend. Used when no redis url is configured and in tests.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .collections
            .get(collection)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, id: &str, json: &str) -> Result<(), StoreError> {
        self.lock()?
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), json.to_string());

        Ok(())
    }

    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;

        match inner
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        {
            Some(current) if current == expected => {
                *current = new.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some())
    }

    async fn claim(&self, index: &str, key: &str, owner: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let keys = inner.indexes.entry(index.to_string()).or_default();

        if keys.contains_key(key) {
            return Ok(false);
        }
        keys.insert(key.to_string(), owner.to_string());

        Ok(true)
    }

    async fn release(&self, index: &str, key: &str) -> Result<(), StoreError> {
        if let Some(keys) = self.lock()?.indexes.get_mut(index) {
            keys.remove(key);
        }

        Ok(())
    }

    async fn owner(&self, index: &str, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .lock()?
            .indexes
            .get(index)
            .and_then(|keys| keys.get(key))
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}
