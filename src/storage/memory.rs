//! In-process model store.

use crate::domain::error::Result;
use crate::domain::{LocalId, MediaModel, PostModel};
use crate::storage::backend::ModelStore;
use crate::storage::models::StoreData;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Model store backed by maps behind an `RwLock`. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    data: RwLock<StoreData>,
}

impl MemoryModelStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `data`.
    #[must_use]
    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelStore for MemoryModelStore {
    fn get_post(&self, id: LocalId) -> Result<Option<PostModel>> {
        Ok(self.read().posts.get(&id).cloned())
    }

    fn get_post_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<PostModel>> {
        Ok(self.read().post_by_remote_id(site_id, remote_id).cloned())
    }

    fn upsert_post(&self, post: &PostModel) -> Result<()> {
        tracing::trace!(post_id = %post.local_id, "memory upsert post");
        self.write().posts.insert(post.local_id, post.clone());
        Ok(())
    }

    fn delete_post(&self, id: LocalId) -> Result<bool> {
        Ok(self.write().posts.remove(&id).is_some())
    }

    fn get_media(&self, id: LocalId) -> Result<Option<MediaModel>> {
        Ok(self.read().media.get(&id).cloned())
    }

    fn get_media_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<MediaModel>> {
        Ok(self.read().media_by_remote_id(site_id, remote_id).cloned())
    }

    fn upsert_media(&self, media: &MediaModel) -> Result<()> {
        tracing::trace!(media_id = %media.local_id, "memory upsert media");
        self.write().media.insert(media.local_id, media.clone());
        Ok(())
    }

    fn delete_media(&self, id: LocalId) -> Result<bool> {
        Ok(self.write().media.remove(&id).is_some())
    }
}
