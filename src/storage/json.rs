//! JSON file-based model store.
//!
//! This module provides a simple, human-readable backend using JSON
//! serialization. Writes go to a temporary file that is then renamed over the
//! target, so a crash never leaves a half-written document behind.
//!
//! # Performance Characteristics
//!
//! - **Read**: O(1) by local id, from the in-memory copy
//! - **Write**: O(n), the whole document is rewritten
//! - **Best for**: small local caches and test fixtures

use crate::domain::error::{Result, SyncError};
use crate::domain::{LocalId, MediaModel, PostModel};
use crate::storage::backend::ModelStore;
use crate::storage::models::StoreData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct JsonState {
    data: StoreData,
    dirty: bool,
}

/// JSON file model store.
///
/// The whole dataset is kept in memory and persisted after every change.
/// A change whose write fails is still applied in memory and marks the store
/// dirty; the dirty flag only exists so the next change, or dropping the
/// store, retries that write.
///
/// # File Format
///
/// ```json
/// {
///   "version": 1,
///   "posts": {
///     "1": { "local_id": 1, "site_id": 9, "title": "Hello", ... }
///   },
///   "media": {
///     "2": { "local_id": 2, "site_id": 9, "file_path": "/tmp/a.jpg", ... }
///   }
/// }
/// ```
pub struct JsonModelStore {
    /// Path to the JSON file on disk.
    file_path: PathBuf,

    /// In-memory copy plus the unsaved-changes flag.
    state: Mutex<JsonState>,
}

impl JsonModelStore {
    /// Creates or opens a JSON store.
    ///
    /// If the file exists its contents are loaded; otherwise the store starts
    /// empty. Parent directories are created automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory creation fails
    /// - File exists but contains invalid JSON
    /// - File permissions prevent reading
    pub fn new(file_path: PathBuf) -> Result<Self> {
        tracing::debug!(path = ?file_path, "initializing JSON model store");

        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            tracing::debug!("initializing new empty store");
            StoreData::default()
        };

        tracing::debug!(
            post_count = data.posts.len(),
            media_count = data.media.len(),
            "model store initialized"
        );

        Ok(Self {
            file_path,
            state: Mutex::new(JsonState { data, dirty: false }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_file(path: &Path) -> Result<StoreData> {
        let contents = std::fs::read_to_string(path)?;
        let data: StoreData = serde_json::from_str(&contents)
            .map_err(|e| SyncError::Storage(format!("failed to parse JSON: {e}")))?;

        tracing::debug!(
            version = data.version,
            posts = data.posts.len(),
            media = data.media.len(),
            "loaded store data"
        );

        Ok(data)
    }

    fn save(path: &Path, state: &mut JsonState) -> Result<()> {
        if !state.dirty {
            tracing::trace!("skipping save, no changes");
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&state.data)?;
        let tmp_path = path.with_extension("tmp");

        tracing::trace!(tmp_path = ?tmp_path, "writing to temporary file");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        state.dirty = false;
        tracing::debug!(path = ?path, "model store saved");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, JsonState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<T>(&self, change: impl FnOnce(&mut StoreData) -> T) -> Result<T> {
        let mut state = self.lock();
        let value = change(&mut state.data);
        state.dirty = true;
        Self::save(&self.file_path, &mut state)?;
        Ok(value)
    }
}

impl ModelStore for JsonModelStore {
    fn get_post(&self, id: LocalId) -> Result<Option<PostModel>> {
        Ok(self.lock().data.posts.get(&id).cloned())
    }

    fn get_post_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<PostModel>> {
        Ok(self.lock().data.post_by_remote_id(site_id, remote_id).cloned())
    }

    fn upsert_post(&self, post: &PostModel) -> Result<()> {
        let _span = tracing::debug_span!("json_upsert_post", post_id = %post.local_id).entered();
        self.mutate(|data| {
            data.posts.insert(post.local_id, post.clone());
        })
    }

    fn delete_post(&self, id: LocalId) -> Result<bool> {
        let _span = tracing::debug_span!("json_delete_post", post_id = %id).entered();
        self.mutate(|data| data.posts.remove(&id).is_some())
    }

    fn get_media(&self, id: LocalId) -> Result<Option<MediaModel>> {
        Ok(self.lock().data.media.get(&id).cloned())
    }

    fn get_media_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<MediaModel>> {
        Ok(self.lock().data.media_by_remote_id(site_id, remote_id).cloned())
    }

    fn upsert_media(&self, media: &MediaModel) -> Result<()> {
        let _span = tracing::debug_span!("json_upsert_media", media_id = %media.local_id).entered();
        self.mutate(|data| {
            data.media.insert(media.local_id, media.clone());
        })
    }

    fn delete_media(&self, id: LocalId) -> Result<bool> {
        let _span = tracing::debug_span!("json_delete_media", media_id = %id).entered();
        self.mutate(|data| data.media.remove(&id).is_some())
    }
}

impl std::fmt::Debug for JsonModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonModelStore")
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl Drop for JsonModelStore {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.dirty {
            tracing::debug!("saving dirty data on drop");
            if let Err(e) = Self::save(&self.file_path, state) {
                tracing::error!(error = %e, "failed to save on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("models.json");

        {
            let store = JsonModelStore::new(path.clone()).unwrap();
            store
                .upsert_post(&PostModel::new(LocalId(1), LocalId(9), "kept"))
                .unwrap();
            store
                .upsert_media(&MediaModel::new(LocalId(2), LocalId(9), "/a.jpg", "image/jpeg"))
                .unwrap();
            store
                .upsert_post(&PostModel::new(LocalId(3), LocalId(9), "dropped"))
                .unwrap();
            assert!(store.delete_post(LocalId(3)).unwrap());
        }

        let reopened = JsonModelStore::new(path).unwrap();
        assert_eq!(reopened.get_post(LocalId(1)).unwrap().unwrap().title, "kept");
        assert!(reopened.get_post(LocalId(3)).unwrap().is_none());
        assert!(reopened.get_media(LocalId(2)).unwrap().is_some());
    }

    #[test]
    fn failed_write_is_retried_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let parent = dir.path().join("store");
        let path = parent.join("models.json");

        {
            let store = JsonModelStore::new(path.clone()).unwrap();
            std::fs::remove_dir_all(&parent).unwrap();

            let result = store.upsert_post(&PostModel::new(LocalId(1), LocalId(9), "late"));
            assert!(result.is_err());
            assert!(store.get_post(LocalId(1)).unwrap().is_some());

            std::fs::create_dir_all(&parent).unwrap();
        }

        let reopened = JsonModelStore::new(path).unwrap();
        assert_eq!(reopened.get_post(LocalId(1)).unwrap().unwrap().title, "late");
    }

    #[test]
    fn rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = JsonModelStore::new(path).unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));
    }

    #[test]
    fn leaves_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.json");
        let store = JsonModelStore::new(path.clone()).unwrap();
        store
            .upsert_post(&PostModel::new(LocalId(1), LocalId(9), "x"))
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
