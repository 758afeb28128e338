//! Model store abstraction.
//!
//! This module defines the [`ModelStore`] trait over the persisted posts and
//! media. The trait is deliberately narrow: the stores use it to apply local
//! actions, and the upload coordinator uses the lookups only to find out
//! whether an entity still exists.

use crate::domain::error::Result;
use crate::domain::{LocalId, MediaModel, PostModel};

/// Abstraction over persistent entity storage.
///
/// Implementations must be safe to share between threads; all methods take
/// `&self` and synchronize internally.
///
/// # Implementations
///
/// - [`MemoryModelStore`](crate::storage::MemoryModelStore): in-process maps
/// - [`JsonModelStore`](crate::storage::JsonModelStore): JSON file with atomic writes
pub trait ModelStore: Send + Sync {
    /// Retrieves a post by local id. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn get_post(&self, id: LocalId) -> Result<Option<PostModel>>;

    /// Retrieves a post by the id the remote side assigned to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn get_post_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<PostModel>>;

    /// Inserts or replaces a post, keyed by its local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails.
    fn upsert_post(&self, post: &PostModel) -> Result<()>;

    /// Deletes a post. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails.
    fn delete_post(&self, id: LocalId) -> Result<bool>;

    /// Retrieves a media item by local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn get_media(&self, id: LocalId) -> Result<Option<MediaModel>>;

    /// Retrieves a media item by the id the remote side assigned to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn get_media_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Result<Option<MediaModel>>;

    /// Inserts or replaces a media item, keyed by its local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails.
    fn upsert_media(&self, media: &MediaModel) -> Result<()>;

    /// Deletes a media item. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails.
    fn delete_media(&self, id: LocalId) -> Result<bool>;
}
