//! Storage container shared by the model store backends.
//!
//! [`StoreData`] is the in-memory shape of every backend and the exact
//! document the JSON backend writes to disk.

use crate::domain::{LocalId, MediaModel, PostModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the on-disk format.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// All persisted posts and media, keyed by local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    /// Version of the storage format for future migrations.
    pub version: u32,

    /// Posts by local id.
    #[serde(default)]
    pub posts: BTreeMap<LocalId, PostModel>,

    /// Media by local id.
    #[serde(default)]
    pub media: BTreeMap<LocalId, MediaModel>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            posts: BTreeMap::new(),
            media: BTreeMap::new(),
        }
    }
}

impl StoreData {
    /// Finds a post by site and remote id.
    #[must_use]
    pub fn post_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Option<&PostModel> {
        self.posts
            .values()
            .find(|post| post.site_id == site_id && post.remote_id == Some(remote_id))
    }

    /// Finds a media item by site and remote id.
    #[must_use]
    pub fn media_by_remote_id(&self, site_id: LocalId, remote_id: i64) -> Option<&MediaModel> {
        self.media
            .values()
            .find(|media| media.site_id == site_id && media.remote_id == Some(remote_id))
    }
}
