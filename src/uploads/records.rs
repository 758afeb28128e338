//! Upload bookkeeping records.

use crate::domain::{ErrorInfo, LocalId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of a tracked media upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaUploadState {
    /// Known but not started.
    Pending,
    /// Upload in flight.
    Uploading,
    /// Uploaded successfully.
    Completed,
    /// Upload failed or was cancelled.
    Failed,
}

impl MediaUploadState {
    /// True while the upload still blocks a post from being published.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Pending | Self::Uploading)
    }

    /// True once the upload has finished one way or another.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Lifecycle of a registered post upload. Completed uploads are deleted, not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostUploadState {
    /// Registered and not yet resolved.
    Pending,
    /// The publish attempt failed.
    Failed,
    /// The caller cancelled the upload.
    Cancelled,
}

/// Tracking entry for one media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaUploadRecord {
    /// Local id of the media entity this record belongs to.
    pub media_id: LocalId,

    /// Current state.
    pub state: MediaUploadState,

    /// Completed fraction in `[0, 1]`.
    pub progress: f32,

    /// Set when the upload ended through cancellation. Implies `Failed`.
    pub canceled: bool,

    /// Failure detail from the last error event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// Unix timestamp of the last change.
    pub updated_at: i64,
}

impl MediaUploadRecord {
    /// A record for an upload that has just started.
    #[must_use]
    pub fn uploading(media_id: LocalId) -> Self {
        Self {
            media_id,
            state: MediaUploadState::Uploading,
            progress: 0.0,
            canceled: false,
            error: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

/// Tracking entry for one post waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUploadRecord {
    /// Local id of the post.
    pub post_id: LocalId,

    /// Current state.
    pub state: PostUploadState,

    /// Media the post is waiting on. Set at registration, only ever shrinks.
    pub associated_media: BTreeSet<LocalId>,

    /// Failure detail of the last publish attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// Number of automatic upload attempts made so far.
    pub auto_upload_attempts: u32,

    /// Unix timestamp of registration.
    pub registered_at: i64,
}

impl PostUploadRecord {
    /// A freshly registered, pending record.
    #[must_use]
    pub fn pending(post_id: LocalId, associated_media: BTreeSet<LocalId>) -> Self {
        Self {
            post_id,
            state: PostUploadState::Pending,
            associated_media,
            error: None,
            auto_upload_attempts: 0,
            registered_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Type string of the last publish failure, e.g. `"UnknownPost"`.
    #[must_use]
    pub fn error_type(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.kind.as_str())
    }
}
