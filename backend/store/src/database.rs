use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{backend::Backend, error::StoreError, memory::MemoryBackend};

/// Concurrent writers on one document retry this many times before giving up.
const MAX_UPDATE_ATTEMPTS: usize = 8;

pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
    /// Human name used in "<kind> not found".
    const KIND: &'static str;

    fn id(&self) -> Uuid;
}

/// Typed access to documents on top of a raw [`Backend`].
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn Backend>,
}

impl Database {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub async fn insert<D: Document>(&self, document: &D) -> Result<(), StoreError> {
        let json = serde_json::to_string(document)?;

        self.backend
            .insert(D::COLLECTION, &document.id().to_string(), &json)
            .await
    }

    pub async fn get<D: Document>(&self, id: Uuid) -> Result<Option<D>, StoreError> {
        match self.backend.get(D::COLLECTION, &id.to_string()).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn fetch<D: Document>(&self, id: Uuid) -> Result<D, StoreError> {
        self.get(id)
            .await?
            .ok_or(StoreError::NotFound { kind: D::KIND })
    }

    pub async fn find<D, P>(&self, predicate: P) -> Result<Vec<D>, StoreError>
    where
        D: Document,
        P: Fn(&D) -> bool,
    {
        let mut documents = Vec::new();

        for json in self.backend.list(D::COLLECTION).await? {
            let document: D = serde_json::from_str(&json)?;
            if predicate(&document) {
                documents.push(document);
            }
        }

        Ok(documents)
    }

    pub async fn delete<D: Document>(&self, id: Uuid) -> Result<bool, StoreError> {
        self.backend.delete(D::COLLECTION, &id.to_string()).await
    }

    /// Applies `apply` to the stored document and writes it back.
    ///
    /// The write only lands if nobody changed the document in between; on a
    /// lost race the document is re-read and `apply` runs again.
    pub async fn update<D, E, F>(&self, id: Uuid, mut apply: F) -> Result<D, E>
    where
        D: Document,
        E: From<StoreError>,
        F: FnMut(&mut D) -> Result<(), E> + Send,
    {
        self.update_with(id, |document| apply(document))
            .await
            .map(|(document, ())| document)
    }

    /// Like [`Database::update`], also handing back whatever `apply` returned.
    pub async fn update_with<D, T, E, F>(&self, id: Uuid, mut apply: F) -> Result<(D, T), E>
    where
        D: Document,
        E: From<StoreError>,
        F: FnMut(&mut D) -> Result<T, E> + Send,
    {
        let key = id.to_string();

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let current = self
                .backend
                .get(D::COLLECTION, &key)
                .await?
                .ok_or(StoreError::NotFound { kind: D::KIND })?;

            let mut document: D = serde_json::from_str(&current).map_err(StoreError::from)?;
            let output = apply(&mut document)?;
            let next = serde_json::to_string(&document).map_err(StoreError::from)?;

            if self
                .backend
                .compare_and_swap(D::COLLECTION, &key, &current, &next)
                .await?
            {
                return Ok((document, output));
            }
        }

        Err(StoreError::Conflict {
            collection: D::COLLECTION,
            id,
        }
        .into())
    }

    pub async fn claim(&self, index: &str, key: &str, owner: Uuid) -> Result<bool, StoreError> {
        self.backend.claim(index, key, &owner.to_string()).await
    }

    pub async fn release(&self, index: &str, key: &str) -> Result<(), StoreError> {
        self.backend.release(index, key).await
    }

    pub async fn owner(&self, index: &str, key: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .backend
            .owner(index, key)
            .await?
            .and_then(|owner| owner.parse().ok()))
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.backend.ping().await
    }
}
