//! In-memory upload table.
//!
//! [`UploadTable`] holds every [`PostUploadRecord`] and [`MediaUploadRecord`]
//! plus an index from media id to the posts waiting on it, so a media state
//! change only ever touches the posts that reference it. The table knows
//! nothing about the bus; the coordinator drives it and turns its return
//! values into events.
//!
//! A post is *ready* when it is pending and none of its associated media is
//! still blocking it: every associated id either has a completed record or no
//! record at all (cleared, or its entity was removed). Failed and cancelled
//! media keep the post waiting until the caller clears them or retries.

use crate::domain::{ErrorInfo, LocalId, Result, SyncError};
use crate::uploads::records::{
    MediaUploadRecord, MediaUploadState, PostUploadRecord, PostUploadState,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Post and media upload records with a media → posts index.
#[derive(Debug, Clone, Default)]
pub struct UploadTable {
    posts: BTreeMap<LocalId, PostUploadRecord>,
    media: BTreeMap<LocalId, MediaUploadRecord>,
    waiting_posts: HashMap<LocalId, BTreeSet<LocalId>>,
}

impl UploadTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `post_id` as waiting on `media_ids`, all marked uploading.
    ///
    /// A failed or cancelled record for the same post is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRegistered`] if a pending record exists.
    pub fn register_post(&mut self, post_id: LocalId, media_ids: BTreeSet<LocalId>) -> Result<()> {
        if let Some(existing) = self.posts.get(&post_id) {
            if existing.state == PostUploadState::Pending {
                return Err(SyncError::AlreadyRegistered { post_id });
            }
            self.remove_post(post_id);
        }

        for &media_id in &media_ids {
            self.media.insert(media_id, MediaUploadRecord::uploading(media_id));
            self.link(post_id, media_id);
        }
        self.posts
            .insert(post_id, PostUploadRecord::pending(post_id, media_ids));
        Ok(())
    }

    /// Starts (or restarts) tracking an upload for `media_id`.
    pub fn start_media(&mut self, media_id: LocalId) {
        self.media.insert(media_id, MediaUploadRecord::uploading(media_id));
    }

    /// Updates the progress of an in-flight upload. Returns `false` if the
    /// media is untracked or already finished.
    pub fn set_progress(&mut self, media_id: LocalId, progress: f32) -> bool {
        match self.media.get_mut(&media_id) {
            Some(record) if record.state.is_in_progress() => {
                record.progress = progress.clamp(0.0, 1.0);
                record.touch();
                true
            }
            _ => false,
        }
    }

    /// Marks `media_id` uploaded and returns the posts that became ready.
    ///
    /// A completed record that no post waits on is released immediately.
    /// Cancelled uploads stay cancelled.
    pub fn complete_media(&mut self, media_id: LocalId) -> Vec<LocalId> {
        let waited_on = self.waiting_posts.contains_key(&media_id);
        match self.media.get_mut(&media_id) {
            Some(record) if record.canceled || record.state == MediaUploadState::Completed => {
                return Vec::new();
            }
            Some(record) => {
                record.state = MediaUploadState::Completed;
                record.progress = 1.0;
                record.error = None;
                record.touch();
            }
            None if waited_on => {
                let mut record = MediaUploadRecord::uploading(media_id);
                record.state = MediaUploadState::Completed;
                record.progress = 1.0;
                self.media.insert(media_id, record);
            }
            None => return Vec::new(),
        }

        if !waited_on {
            self.media.remove(&media_id);
            return Vec::new();
        }

        self.posts_waiting_on(media_id)
            .into_iter()
            .filter(|&post_id| self.is_ready(post_id))
            .collect()
    }

    /// Marks `media_id` failed. Completed and cancelled records are left alone.
    pub fn fail_media(&mut self, media_id: LocalId, error: ErrorInfo) -> bool {
        let waited_on = self.waiting_posts.contains_key(&media_id);
        match self.media.get_mut(&media_id) {
            Some(record) if record.state.is_terminal() => false,
            Some(record) => {
                record.state = MediaUploadState::Failed;
                record.error = Some(error);
                record.touch();
                true
            }
            None if waited_on => {
                let mut record = MediaUploadRecord::uploading(media_id);
                record.state = MediaUploadState::Failed;
                record.error = Some(error);
                self.media.insert(media_id, record);
                true
            }
            None => false,
        }
    }

    /// Ends an in-flight upload as cancelled. Returns `false` (and changes
    /// nothing) if the upload already finished or is untracked.
    pub fn cancel_media(&mut self, media_id: LocalId) -> bool {
        match self.media.get_mut(&media_id) {
            Some(record) if record.state.is_in_progress() => {
                record.state = MediaUploadState::Failed;
                record.canceled = true;
                record.touch();
                true
            }
            _ => false,
        }
    }

    /// Drops the record of a media entity that no longer exists and returns
    /// the posts that became ready because of it.
    pub fn remove_media(&mut self, media_id: LocalId) -> (Option<MediaUploadRecord>, Vec<LocalId>) {
        let removed = self.media.remove(&media_id);
        let waiting = self.waiting_posts.remove(&media_id).unwrap_or_default();
        let ready = if removed.as_ref().is_some_and(|r| r.state != MediaUploadState::Completed) {
            waiting
                .into_iter()
                .filter(|&post_id| self.is_ready(post_id))
                .collect()
        } else {
            Vec::new()
        };
        (removed, ready)
    }

    /// Stops `post_id` waiting on `media_ids` and deletes the records no other
    /// post still waits on.
    ///
    /// Returns `true` if the post is registered.
    pub fn clear_media(&mut self, post_id: LocalId, media_ids: &BTreeSet<LocalId>) -> bool {
        for &media_id in media_ids {
            self.unlink(post_id, media_id);
            if !self.waiting_posts.contains_key(&media_id) {
                self.media.remove(&media_id);
            }
        }

        match self.posts.get_mut(&post_id) {
            Some(record) => {
                record
                    .associated_media
                    .retain(|media_id| !media_ids.contains(media_id));
                true
            }
            None => false,
        }
    }

    /// Deletes the record of `post_id` and releases completed media no other
    /// post waits on.
    pub fn remove_post(&mut self, post_id: LocalId) -> Option<PostUploadRecord> {
        let record = self.posts.remove(&post_id)?;
        for &media_id in &record.associated_media {
            self.unlink(post_id, media_id);
            let completed = self
                .media
                .get(&media_id)
                .is_some_and(|media| media.state == MediaUploadState::Completed);
            if completed && !self.waiting_posts.contains_key(&media_id) {
                self.media.remove(&media_id);
            }
        }
        Some(record)
    }

    /// Marks a registered post as failed.
    pub fn fail_post(&mut self, post_id: LocalId, error: ErrorInfo) -> bool {
        match self.posts.get_mut(&post_id) {
            Some(record) => {
                record.state = PostUploadState::Failed;
                record.error = Some(error);
                true
            }
            None => false,
        }
    }

    /// Marks a registered post as cancelled.
    pub fn cancel_post(&mut self, post_id: LocalId) -> bool {
        match self.posts.get_mut(&post_id) {
            Some(record) if record.state != PostUploadState::Cancelled => {
                record.state = PostUploadState::Cancelled;
                true
            }
            _ => false,
        }
    }

    /// Counts one more automatic upload attempt; returns the new total.
    pub fn increment_attempts(&mut self, post_id: LocalId) -> Option<u32> {
        let record = self.posts.get_mut(&post_id)?;
        record.auto_upload_attempts = record.auto_upload_attempts.saturating_add(1);
        Some(record.auto_upload_attempts)
    }

    /// True if `post_id` is pending and no associated media blocks it.
    #[must_use]
    pub fn is_ready(&self, post_id: LocalId) -> bool {
        self.posts.get(&post_id).is_some_and(|record| {
            record.state == PostUploadState::Pending
                && record.associated_media.iter().all(|media_id| {
                    self.media
                        .get(media_id)
                        .map_or(true, |media| media.state == MediaUploadState::Completed)
                })
        })
    }

    /// Record of a post, if registered.
    #[must_use]
    pub fn post(&self, post_id: LocalId) -> Option<&PostUploadRecord> {
        self.posts.get(&post_id)
    }

    /// Record of a media item, if tracked.
    #[must_use]
    pub fn media(&self, media_id: LocalId) -> Option<&MediaUploadRecord> {
        self.media.get(&media_id)
    }

    /// Registered posts in ascending id order.
    #[must_use]
    pub fn post_ids(&self) -> Vec<LocalId> {
        self.posts.keys().copied().collect()
    }

    /// Tracked media in ascending id order.
    #[must_use]
    pub fn media_ids(&self) -> Vec<LocalId> {
        self.media.keys().copied().collect()
    }

    /// Registered posts in `state`.
    #[must_use]
    pub fn posts_in_state(&self, state: PostUploadState) -> Vec<LocalId> {
        self.posts
            .values()
            .filter(|record| record.state == state)
            .map(|record| record.post_id)
            .collect()
    }

    /// Posts whose associated media include `media_id`.
    #[must_use]
    pub fn posts_waiting_on(&self, media_id: LocalId) -> Vec<LocalId> {
        self.waiting_posts
            .get(&media_id)
            .map(|posts| posts.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Associated media of `post_id` whose record satisfies `matches`.
    pub fn media_for_post<F>(&self, post_id: LocalId, matches: F) -> BTreeSet<LocalId>
    where
        F: Fn(&MediaUploadRecord) -> bool,
    {
        self.posts
            .get(&post_id)
            .map(|record| {
                record
                    .associated_media
                    .iter()
                    .filter(|media_id| self.media.get(media_id).is_some_and(&matches))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn link(&mut self, post_id: LocalId, media_id: LocalId) {
        self.waiting_posts.entry(media_id).or_default().insert(post_id);
    }

    fn unlink(&mut self, post_id: LocalId, media_id: LocalId) {
        if let Some(posts) = self.waiting_posts.get_mut(&media_id) {
            posts.remove(&post_id);
            if posts.is_empty() {
                self.waiting_posts.remove(&media_id);
            }
        }
    }
}
