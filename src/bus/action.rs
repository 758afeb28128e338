//! Actions submitted to the [`ActionBus`](crate::bus::ActionBus).
//!
//! An [`Action`] is an immutable request: a typed [`ActionPayload`], a unique
//! [`ActionId`], and an optional follow-up action that runs only if this one
//! resolves successfully. The payload's [`ActionKind`] decides which
//! [`ActionCategory`] of handlers receives it.
//!
//! # Example
//!
//! ```
//! use sitesync::bus::{Action, ActionCategory};
//! use sitesync::domain::{LocalId, MediaModel, PostModel};
//!
//! let post = PostModel::new(LocalId(1), LocalId(9), "Trip report");
//! let media = MediaModel::new(LocalId(2), LocalId(9), "/tmp/a.jpg", "image/jpeg");
//!
//! let action = Action::upload_media(media).then(Action::push_post(post));
//! assert_eq!(action.category(), ActionCategory::Media);
//! assert_eq!(action.chain().count(), 1);
//! ```

use crate::bus::trace::TraceContext;
use crate::domain::{ActionId, LocalId, MediaModel, PostModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Partition of the handler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionCategory {
    /// Post fetch, push, update and removal.
    Post,
    /// Media upload, cancellation, update and removal.
    Media,
    /// Site fetches.
    Site,
    /// Comment pushes.
    Comment,
    /// Upload bookkeeping owned by the coordinator.
    Upload,
}

impl ActionCategory {
    /// Every category, in registry order.
    pub const ALL: [Self; 5] = [Self::Post, Self::Media, Self::Site, Self::Comment, Self::Upload];

    /// Position of the category in [`ActionCategory::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Post => 0,
            Self::Media => 1,
            Self::Site => 2,
            Self::Comment => 3,
            Self::Upload => 4,
        }
    }
}

/// Payload-free tag of an action, used as the `cause` of change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionKind {
    FetchPost,
    PushPost,
    UpdatePost,
    DeletePost,
    RemovePost,
    UploadMedia,
    CancelMediaUpload,
    UpdateMedia,
    DeleteMedia,
    RemoveMedia,
    ClearMediaForPost,
    CancelPost,
    IncrementAutoUploadAttempts,
    /// Event-only cause: the coordinator signals that a post's media are done.
    PostReadyToPublish,
    FetchSite,
    PushComment,
}

impl ActionKind {
    /// Category whose handlers receive actions of this kind.
    #[must_use]
    pub const fn category(self) -> ActionCategory {
        match self {
            Self::FetchPost
            | Self::PushPost
            | Self::UpdatePost
            | Self::DeletePost
            | Self::RemovePost => ActionCategory::Post,
            Self::UploadMedia
            | Self::CancelMediaUpload
            | Self::UpdateMedia
            | Self::DeleteMedia
            | Self::RemoveMedia => ActionCategory::Media,
            Self::ClearMediaForPost
            | Self::CancelPost
            | Self::IncrementAutoUploadAttempts
            | Self::PostReadyToPublish => ActionCategory::Upload,
            Self::FetchSite => ActionCategory::Site,
            Self::PushComment => ActionCategory::Comment,
        }
    }
}

/// Typed data of an action. Each variant maps to exactly one [`ActionKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionPayload {
    /// Fetch a post from the remote side.
    FetchPost { post_id: LocalId },
    /// Upload a post to the remote side.
    PushPost { post: PostModel },
    /// Save a post locally.
    UpdatePost { post: PostModel },
    /// Delete a post remotely (and locally once that succeeds).
    DeletePost { post_id: LocalId },
    /// Remove a post from the local model store only.
    RemovePost { post_id: LocalId },
    /// Upload a media file.
    UploadMedia { media: MediaModel },
    /// Cancel an in-flight media upload, optionally deleting the local entity.
    CancelMediaUpload { media_id: LocalId, delete: bool },
    /// Save a media item locally.
    UpdateMedia { media: MediaModel },
    /// Delete a media item remotely (and locally once that succeeds).
    DeleteMedia { media_id: LocalId },
    /// Remove a media item from the local model store only.
    RemoveMedia { media_id: LocalId },
    /// Stop waiting on the given media for a registered post.
    ClearMediaForPost {
        post_id: LocalId,
        media_ids: BTreeSet<LocalId>,
    },
    /// Mark a registered post upload as cancelled.
    CancelPost { post_id: LocalId },
    /// Count one more automatic upload attempt for a registered post.
    IncrementAutoUploadAttempts { post_id: LocalId },
    /// Fetch a site's settings.
    FetchSite { site_id: LocalId },
    /// Upload a comment.
    PushComment { comment_id: LocalId, post_id: LocalId },
}

impl ActionPayload {
    /// Kind tag of this payload.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::FetchPost { .. } => ActionKind::FetchPost,
            Self::PushPost { .. } => ActionKind::PushPost,
            Self::UpdatePost { .. } => ActionKind::UpdatePost,
            Self::DeletePost { .. } => ActionKind::DeletePost,
            Self::RemovePost { .. } => ActionKind::RemovePost,
            Self::UploadMedia { .. } => ActionKind::UploadMedia,
            Self::CancelMediaUpload { .. } => ActionKind::CancelMediaUpload,
            Self::UpdateMedia { .. } => ActionKind::UpdateMedia,
            Self::DeleteMedia { .. } => ActionKind::DeleteMedia,
            Self::RemoveMedia { .. } => ActionKind::RemoveMedia,
            Self::ClearMediaForPost { .. } => ActionKind::ClearMediaForPost,
            Self::CancelPost { .. } => ActionKind::CancelPost,
            Self::IncrementAutoUploadAttempts { .. } => ActionKind::IncrementAutoUploadAttempts,
            Self::FetchSite { .. } => ActionKind::FetchSite,
            Self::PushComment { .. } => ActionKind::PushComment,
        }
    }

    /// Local ids this action resolves when it completes.
    #[must_use]
    pub fn targets(&self) -> Vec<LocalId> {
        match self {
            Self::FetchPost { post_id }
            | Self::DeletePost { post_id }
            | Self::RemovePost { post_id }
            | Self::ClearMediaForPost { post_id, .. }
            | Self::CancelPost { post_id }
            | Self::IncrementAutoUploadAttempts { post_id } => vec![*post_id],
            Self::PushPost { post } | Self::UpdatePost { post } => vec![post.local_id],
            Self::UploadMedia { media } | Self::UpdateMedia { media } => vec![media.local_id],
            Self::CancelMediaUpload { media_id, .. }
            | Self::DeleteMedia { media_id }
            | Self::RemoveMedia { media_id } => vec![*media_id],
            Self::FetchSite { site_id } => vec![*site_id],
            Self::PushComment { comment_id, .. } => vec![*comment_id],
        }
    }

    /// Checks that the payload carries what its handlers need.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::PushPost { post } | Self::UpdatePost { post } if post.site_id.get() <= 0 => {
                Err(format!("post {} has no site", post.local_id))
            }
            Self::UploadMedia { media } if media.file_path.trim().is_empty() => {
                Err(format!("media {} has no file path", media.local_id))
            }
            Self::UploadMedia { media } if media.mime_type.trim().is_empty() => {
                Err(format!("media {} has no mime type", media.local_id))
            }
            _ => Ok(()),
        }
    }
}

/// An immutable request delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    id: ActionId,
    payload: ActionPayload,
    next_on_success: Option<Arc<Action>>,
    trace_context: Option<TraceContext>,
}

/// Generates one constructor per payload variant that attaches the current
/// trace context.
macro_rules! action_builders {
    (
        $(
            $builder_name:ident($variant:ident { $($field:ident: $ty:ty),* $(,)? })
        ),* $(,)?
    ) => {
        impl Action {
            $(
                #[doc = concat!("Creates a ", stringify!($variant), " action with the current trace context.")]
                #[must_use]
                pub fn $builder_name($($field: $ty),*) -> Self {
                    Self::new(ActionPayload::$variant { $($field,)* })
                }
            )*
        }
    };
}

action_builders! {
    fetch_post(FetchPost { post_id: LocalId }),
    push_post(PushPost { post: PostModel }),
    update_post(UpdatePost { post: PostModel }),
    delete_post(DeletePost { post_id: LocalId }),
    remove_post(RemovePost { post_id: LocalId }),
    upload_media(UploadMedia { media: MediaModel }),
    cancel_media_upload(CancelMediaUpload { media_id: LocalId, delete: bool }),
    update_media(UpdateMedia { media: MediaModel }),
    delete_media(DeleteMedia { media_id: LocalId }),
    remove_media(RemoveMedia { media_id: LocalId }),
    clear_media_for_post(ClearMediaForPost { post_id: LocalId, media_ids: BTreeSet<LocalId> }),
    cancel_post(CancelPost { post_id: LocalId }),
    increment_auto_upload_attempts(IncrementAutoUploadAttempts { post_id: LocalId }),
    fetch_site(FetchSite { site_id: LocalId }),
    push_comment(PushComment { comment_id: LocalId, post_id: LocalId }),
}

impl Action {
    /// Wraps a payload in a new action with a fresh id.
    #[must_use]
    pub fn new(payload: ActionPayload) -> Self {
        Self {
            id: ActionId::next(),
            payload,
            next_on_success: None,
            trace_context: TraceContext::from_current(),
        }
    }

    /// Appends `next` to the end of this action's chain.
    ///
    /// Links are shared immutably, so the existing tail is rebuilt rather
    /// than modified in place.
    #[must_use]
    pub fn then(mut self, next: Self) -> Self {
        let tail = match self.next_on_success.take() {
            Some(existing) => Self::clone(&existing).then(next),
            None => next,
        };
        self.next_on_success = Some(Arc::new(tail));
        self
    }

    /// Unique id of this action.
    #[must_use]
    pub const fn id(&self) -> ActionId {
        self.id
    }

    /// The typed payload.
    #[must_use]
    pub const fn payload(&self) -> &ActionPayload {
        &self.payload
    }

    /// Kind tag of the payload.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// Registry category this action is delivered to.
    #[must_use]
    pub const fn category(&self) -> ActionCategory {
        self.payload.kind().category()
    }

    /// Local ids this action resolves.
    #[must_use]
    pub fn targets(&self) -> Vec<LocalId> {
        self.payload.targets()
    }

    /// The action to dispatch once this one succeeds.
    #[must_use]
    pub fn next_on_success(&self) -> Option<&Self> {
        self.next_on_success.as_deref()
    }

    pub(crate) fn next_on_success_shared(&self) -> Option<Arc<Self>> {
        self.next_on_success.clone()
    }

    /// Iterates over the follow-up actions, nearest first.
    pub fn chain(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(self.next_on_success(), |action| action.next_on_success())
    }

    /// Trace context captured when the action was built.
    #[must_use]
    pub const fn trace_context(&self) -> Option<&TraceContext> {
        self.trace_context.as_ref()
    }

    /// See [`ActionPayload::validate`].
    ///
    /// # Errors
    ///
    /// Returns a description of the malformed field.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.payload.validate()
    }
}
