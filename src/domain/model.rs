//! Post and media entity models.
//!
//! These are the entities held by the model store. The sync core only ever
//! reads their identifiers and validates the fields an action needs; business
//! mutations belong to the stores and the remote clients.

use crate::domain::ids::LocalId;
use serde::{Deserialize, Serialize};

/// A post as persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostModel {
    /// Local id assigned by the model store.
    pub local_id: LocalId,

    /// Local id of the site the post belongs to.
    pub site_id: LocalId,

    /// Id assigned by the remote side once the post has been pushed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,

    /// Post title.
    pub title: String,

    /// Post body.
    #[serde(default)]
    pub content: String,

    /// Publish status as understood by the remote side (`draft`, `publish`, ...).
    pub status: String,

    /// True until the post has been pushed at least once.
    pub is_local_draft: bool,

    /// Unix timestamp of the last local modification.
    pub modified_at: i64,
}

impl PostModel {
    /// Creates a new local draft.
    #[must_use]
    pub fn new(local_id: LocalId, site_id: LocalId, title: impl Into<String>) -> Self {
        Self {
            local_id,
            site_id,
            remote_id: None,
            title: title.into(),
            content: String::new(),
            status: "draft".to_string(),
            is_local_draft: true,
            modified_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// A media item as persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaModel {
    /// Local id assigned by the model store.
    pub local_id: LocalId,

    /// Local id of the site the media belongs to.
    pub site_id: LocalId,

    /// Id assigned by the remote side once uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<i64>,

    /// Local id of the post this media was inserted into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<LocalId>,

    /// Path of the local file to upload.
    pub file_path: String,

    /// MIME type of the file.
    pub mime_type: String,

    /// Remote URL once uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MediaModel {
    /// Creates a media item pointing at a local file.
    #[must_use]
    pub fn new(
        local_id: LocalId,
        site_id: LocalId,
        file_path: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            local_id,
            site_id,
            remote_id: None,
            post_id: None,
            file_path: file_path.into(),
            mime_type: mime_type.into(),
            url: None,
        }
    }

    /// Associates the media with a post.
    #[must_use]
    pub fn for_post(mut self, post_id: LocalId) -> Self {
        self.post_id = Some(post_id);
        self
    }
}
