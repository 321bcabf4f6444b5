use async_trait::async_trait;

use crate::error::StoreError;

/// Raw JSON document storage.
///
/// Documents live in named collections keyed by id. Unique indexes map a key
/// (an email, a rater/donation pair) to the id of the document that owns it.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<String>, StoreError>;

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;

    async fn insert(&self, collection: &str, id: &str, json: &str) -> Result<(), StoreError>;

    /// Replaces the document only if it still equals `expected`.
    async fn compare_and_swap(
        &self,
        collection: &str,
        id: &str,
        expected: &str,
        new: &str,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Sets `key` in `index` only if absent. Returns whether it was set.
    async fn claim(&self, index: &str, key: &str, owner: &str) -> Result<bool, StoreError>;

    async fn release(&self, index: &str, key: &str) -> Result<(), StoreError>;

    async fn owner(&self, index: &str, key: &str) -> Result<Option<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
