//! Upload coordinator.
//!
//! [`UploadCoordinator`] tracks which posts are waiting on which media uploads
//! and signals when a post has nothing left to wait for. It listens on the
//! `Media`, `Post` and `Upload` categories and reacts to the change events the
//! remote side reports:
//!
//! | event                                | effect                                   |
//! |--------------------------------------|------------------------------------------|
//! | `UploadMedia` progress               | progress of the media record             |
//! | `UploadMedia` success                | media completed, readiness re-checked    |
//! | `UploadMedia` error                  | media failed, posts stay pending         |
//! | `UploadMedia` canceled / cancel done | media failed with `canceled` set         |
//! | `PushPost` success                   | post record deleted                      |
//! | `PushPost` error                     | post failed, error kept                  |
//! | `DeletePost`/`RemovePost` success    | post record deleted                      |
//! | `DeleteMedia`/`RemoveMedia` success  | media record deleted                     |
//!
//! When a post becomes ready the coordinator publishes a
//! [`ActionKind::PostReadyToPublish`] event on the `Upload` category. It never
//! pushes the post itself; see [`AutoPublisher`](crate::uploads::AutoPublisher)
//! for the handler that does.
//!
//! The table lock is never held across a call into the bus.

use crate::bus::{
    Action, ActionBus, ActionCategory, ActionKind, ActionPayload, ChangeEvent, Handler, Stage, TraceContext,
};
use crate::domain::{ErrorInfo, LocalId, MediaModel, PostModel, Result, SyncError};
use crate::storage::ModelStore;
use crate::uploads::records::{MediaUploadRecord, MediaUploadState, PostUploadRecord, PostUploadState};
use crate::uploads::table::UploadTable;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Records removed by [`UploadCoordinator::purge_orphans`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Post records whose post no longer exists.
    pub posts: Vec<LocalId>,
    /// Media records whose media no longer exists.
    pub media: Vec<LocalId>,
}

impl PurgeReport {
    /// True if nothing was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.media.is_empty()
    }
}

/// Upload bookkeeping for posts and their media.
///
/// # Example
///
/// ```
/// use sitesync::bus::{ActionBus, ActionKind, ChangeEvent};
/// use sitesync::domain::{LocalId, MediaModel, PostModel};
/// use sitesync::storage::MemoryModelStore;
/// use sitesync::uploads::UploadCoordinator;
/// use std::sync::Arc;
///
/// let bus = ActionBus::new();
/// let uploads = UploadCoordinator::new(Arc::new(MemoryModelStore::new())).attach(&bus);
///
/// let post = PostModel::new(LocalId(1), LocalId(9), "Trip");
/// let photo = MediaModel::new(LocalId(2), LocalId(9), "/photos/a.jpg", "image/jpeg");
/// uploads.register_post(&bus, &post, &[photo])?;
/// assert!(!uploads.is_post_ready(LocalId(1)));
///
/// bus.publish(ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(2)]))?;
/// assert!(uploads.is_post_ready(LocalId(1)));
/// # Ok::<(), sitesync::SyncError>(())
/// ```
pub struct UploadCoordinator {
    table: Mutex<UploadTable>,
    models: Arc<dyn ModelStore>,
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("table", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl UploadCoordinator {
    /// Categories the coordinator listens on.
    pub const CATEGORIES: [ActionCategory; 3] =
        [ActionCategory::Media, ActionCategory::Post, ActionCategory::Upload];

    /// Creates a coordinator with an empty table.
    ///
    /// `models` is consulted only by [`purge_orphans`](Self::purge_orphans).
    #[must_use]
    pub fn new(models: Arc<dyn ModelStore>) -> Self {
        Self {
            table: Mutex::new(UploadTable::new()),
            models,
        }
    }

    /// Registers the coordinator on `bus` and returns the shared handle.
    #[must_use]
    pub fn attach(self, bus: &ActionBus) -> Arc<Self> {
        let coordinator = Arc::new(self);
        bus.register(coordinator.clone(), &Self::CATEGORIES);
        coordinator
    }

    fn lock(&self) -> MutexGuard<'_, UploadTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts tracking `post` as waiting on `media`, each marked uploading.
    ///
    /// A failed or cancelled record for the post is replaced. A post
    /// registered without media is ready at once and is signalled right away.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AlreadyRegistered`](crate::SyncError::AlreadyRegistered)
    /// if the post already has a pending record, or the delivery error of the
    /// readiness signal.
    pub fn register_post(&self, bus: &ActionBus, post: &PostModel, media: &[MediaModel]) -> Result<()> {
        let media_ids: BTreeSet<LocalId> = media.iter().map(|m| m.local_id).collect();
        let _span = tracing::debug_span!(
            "register_post",
            post_id = %post.local_id,
            media = media_ids.len()
        )
        .entered();

        let ready = {
            let mut table = self.lock();
            table.register_post(post.local_id, media_ids)?;
            table.is_ready(post.local_id)
        };
        tracing::debug!(ready, "post upload registered");

        if ready {
            Self::signal_ready(bus, vec![post.local_id], None)
        } else {
            Ok(())
        }
    }

    /// Stops `post_id` waiting on `media_ids` and deletes the records no other
    /// post waits on.
    ///
    /// Always publishes a `ClearMediaForPost` event for the post, even when
    /// the set is empty, so observers can re-check readiness. If clearing
    /// unblocked the post, a readiness signal follows.
    ///
    /// # Errors
    ///
    /// Returns the delivery errors of those events.
    pub fn clear_media(&self, bus: &ActionBus, post_id: LocalId, media_ids: &BTreeSet<LocalId>) -> Result<()> {
        let (registered, unblocked) = {
            let mut table = self.lock();
            let was_ready = table.is_ready(post_id);
            let registered = table.clear_media(post_id, media_ids);
            (registered, !was_ready && table.is_ready(post_id))
        };
        tracing::debug!(%post_id, cleared = media_ids.len(), registered, unblocked, "media cleared for post");

        let cleared = bus.publish(ChangeEvent::success(ActionKind::ClearMediaForPost, vec![post_id]));
        let signalled = if unblocked {
            Self::signal_ready(bus, vec![post_id], None)
        } else {
            Ok(())
        };
        cleared.and(signalled)
    }

    /// Deletes the record of `post_id`. Returns `true` if one existed.
    pub fn clear_post(&self, post_id: LocalId) -> bool {
        let removed = self.lock().remove_post(post_id).is_some();
        tracing::debug!(%post_id, removed, "post upload cleared");
        removed
    }

    /// Marks the upload of `post_id` as cancelled. Returns `false` if it is
    /// unregistered or already cancelled.
    pub fn cancel_post(&self, post_id: LocalId) -> bool {
        let cancelled = self.lock().cancel_post(post_id);
        tracing::debug!(%post_id, cancelled, "post upload cancel requested");
        cancelled
    }

    /// Counts an automatic upload attempt. Returns the new count, or `None`
    /// for an unregistered post.
    pub fn increment_auto_upload_attempts(&self, post_id: LocalId) -> Option<u32> {
        self.lock().increment_attempts(post_id)
    }

    /// Deletes records whose post or media no longer exists in the model store.
    ///
    /// # Errors
    ///
    /// Returns the first model store error. Records checked before the error
    /// stay as they were.
    pub fn purge_orphans(&self) -> Result<PurgeReport> {
        let _span = tracing::debug_span!("purge_orphans").entered();
        let (post_ids, media_ids) = {
            let table = self.lock();
            (table.post_ids(), table.media_ids())
        };

        let mut report = PurgeReport::default();
        for post_id in post_ids {
            if self.models.get_post(post_id)?.is_none() {
                report.posts.push(post_id);
            }
        }
        for media_id in media_ids {
            if self.models.get_media(media_id)?.is_none() {
                report.media.push(media_id);
            }
        }

        let mut table = self.lock();
        for &post_id in &report.posts {
            table.remove_post(post_id);
        }
        for &media_id in &report.media {
            table.remove_media(media_id);
        }
        drop(table);

        tracing::debug!(posts = report.posts.len(), media = report.media.len(), "orphans purged");
        Ok(report)
    }

    /// True if `post_id` has a pending record.
    #[must_use]
    pub fn is_pending_post(&self, post_id: LocalId) -> bool {
        self.post_state(post_id) == Some(PostUploadState::Pending)
    }

    /// True if the last publish attempt of `post_id` failed.
    #[must_use]
    pub fn is_failed_post(&self, post_id: LocalId) -> bool {
        self.post_state(post_id) == Some(PostUploadState::Failed)
    }

    /// True if the upload of `post_id` was cancelled.
    #[must_use]
    pub fn is_cancelled_post(&self, post_id: LocalId) -> bool {
        self.post_state(post_id) == Some(PostUploadState::Cancelled)
    }

    /// True if `post_id` is pending and none of its media blocks it.
    #[must_use]
    pub fn is_post_ready(&self, post_id: LocalId) -> bool {
        self.lock().is_ready(post_id)
    }

    /// Failure detail of the last publish attempt.
    #[must_use]
    pub fn post_error(&self, post_id: LocalId) -> Option<ErrorInfo> {
        self.lock().post(post_id).and_then(|record| record.error.clone())
    }

    /// Every registered post, in ascending id order.
    #[must_use]
    pub fn all_registered_posts(&self) -> Vec<LocalId> {
        self.lock().post_ids()
    }

    /// Posts with a pending record.
    #[must_use]
    pub fn pending_posts(&self) -> Vec<LocalId> {
        self.lock().posts_in_state(PostUploadState::Pending)
    }

    /// Posts whose publish attempt failed.
    #[must_use]
    pub fn failed_posts(&self) -> Vec<LocalId> {
        self.lock().posts_in_state(PostUploadState::Failed)
    }

    /// Posts whose upload was cancelled.
    #[must_use]
    pub fn cancelled_posts(&self) -> Vec<LocalId> {
        self.lock().posts_in_state(PostUploadState::Cancelled)
    }

    /// Media `post_id` is waiting on.
    #[must_use]
    pub fn associated_media(&self, post_id: LocalId) -> BTreeSet<LocalId> {
        self.lock()
            .post(post_id)
            .map(|record| record.associated_media.clone())
            .unwrap_or_default()
    }

    /// Associated media of `post_id` that finished uploading.
    #[must_use]
    pub fn completed_media_for_post(&self, post_id: LocalId) -> BTreeSet<LocalId> {
        self.lock()
            .media_for_post(post_id, |m| m.state == MediaUploadState::Completed)
    }

    /// Associated media of `post_id` still uploading.
    #[must_use]
    pub fn uploading_media_for_post(&self, post_id: LocalId) -> BTreeSet<LocalId> {
        self.lock().media_for_post(post_id, |m| m.state.is_in_progress())
    }

    /// Associated media of `post_id` that failed or were cancelled.
    #[must_use]
    pub fn failed_media_for_post(&self, post_id: LocalId) -> BTreeSet<LocalId> {
        self.lock()
            .media_for_post(post_id, |m| m.state == MediaUploadState::Failed)
    }

    /// Upload progress of `media_id`; `0.0` when untracked.
    #[must_use]
    pub fn media_progress(&self, media_id: LocalId) -> f32 {
        self.lock().media(media_id).map_or(0.0, |record| record.progress)
    }

    /// Snapshot of the record of `media_id`.
    #[must_use]
    pub fn media_record(&self, media_id: LocalId) -> Option<MediaUploadRecord> {
        self.lock().media(media_id).cloned()
    }

    /// Snapshot of the record of `post_id`.
    #[must_use]
    pub fn post_record(&self, post_id: LocalId) -> Option<PostUploadRecord> {
        self.lock().post(post_id).cloned()
    }

    /// Number of posts that failed or were cancelled.
    #[must_use]
    pub fn errors_or_cancellations_count(&self) -> usize {
        let table = self.lock();
        table.posts_in_state(PostUploadState::Failed).len()
            + table.posts_in_state(PostUploadState::Cancelled).len()
    }

    /// Publishes one readiness signal per post. Every post is signalled even
    /// when an earlier delivery fails.
    fn signal_ready(bus: &ActionBus, posts: Vec<LocalId>, trace_context: Option<TraceContext>) -> Result<()> {
        let mut failures = Vec::new();
        for post_id in posts {
            tracing::debug!(%post_id, "post ready to publish");
            let mut signal = ChangeEvent::success(ActionKind::PostReadyToPublish, vec![post_id]);
            signal.trace_context = trace_context.clone();
            if let Err(error) = bus.publish(signal) {
                failures.push(error);
            }
        }

        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(SyncError::Delivery {
                subject: "PostReadyToPublish signals".to_string(),
                failures,
            }),
        }
    }

    fn post_state(&self, post_id: LocalId) -> Option<PostUploadState> {
        self.lock().post(post_id).map(|record| record.state)
    }

    /// Applies `event` to the table and returns the posts that became ready.
    fn apply(&self, event: &ChangeEvent) -> Vec<LocalId> {
        let mut table = self.lock();
        let mut ready = Vec::new();

        match event.cause {
            ActionKind::UploadMedia => {
                for &media_id in &event.affected_ids {
                    match (&event.stage, &event.error) {
                        (Stage::Progress(fraction), _) => {
                            table.set_progress(media_id, *fraction);
                        }
                        (Stage::Canceled, _) => {
                            if table.cancel_media(media_id) {
                                tracing::debug!(%media_id, "media upload cancelled");
                            }
                        }
                        (Stage::Resolved, Some(error)) => {
                            if table.fail_media(media_id, error.clone()) {
                                tracing::debug!(%media_id, error = %error, "media upload failed");
                            }
                        }
                        (Stage::Resolved, None) => {
                            tracing::debug!(%media_id, "media upload completed");
                            ready.extend(table.complete_media(media_id));
                        }
                    }
                }
            }
            ActionKind::CancelMediaUpload if event.is_success() => {
                for &media_id in &event.affected_ids {
                    table.cancel_media(media_id);
                }
            }
            ActionKind::PushPost => {
                for &post_id in &event.affected_ids {
                    match (&event.stage, &event.error) {
                        (Stage::Resolved, None) => {
                            table.remove_post(post_id);
                            tracing::debug!(%post_id, "post published, record deleted");
                        }
                        (Stage::Resolved, Some(error)) => {
                            table.fail_post(post_id, error.clone());
                            tracing::debug!(%post_id, error = %error, "post publish failed");
                        }
                        (Stage::Canceled, _) => {
                            table.cancel_post(post_id);
                        }
                        (Stage::Progress(_), _) => {}
                    }
                }
            }
            ActionKind::DeletePost | ActionKind::RemovePost if event.is_success() => {
                for &post_id in &event.affected_ids {
                    table.remove_post(post_id);
                }
            }
            ActionKind::DeleteMedia | ActionKind::RemoveMedia if event.is_success() => {
                for &media_id in &event.affected_ids {
                    let (_, now_ready) = table.remove_media(media_id);
                    ready.extend(now_ready);
                }
            }
            _ => {}
        }

        ready.sort_unstable();
        ready.dedup();
        ready
    }
}

impl Handler for UploadCoordinator {
    fn name(&self) -> &str {
        "upload-coordinator"
    }

    fn on_action(&self, bus: &ActionBus, action: &Action) -> Result<()> {
        match action.payload() {
            ActionPayload::UploadMedia { media } => {
                self.lock().start_media(media.local_id);
                tracing::trace!(media_id = %media.local_id, "media upload started");
                Ok(())
            }
            ActionPayload::ClearMediaForPost { post_id, media_ids } => {
                self.clear_media(bus, *post_id, media_ids)
            }
            ActionPayload::CancelPost { post_id } => {
                self.cancel_post(*post_id);
                bus.publish(ChangeEvent::success(ActionKind::CancelPost, vec![*post_id]).for_action(action))
            }
            ActionPayload::IncrementAutoUploadAttempts { post_id } => {
                self.increment_auto_upload_attempts(*post_id);
                bus.publish(
                    ChangeEvent::success(ActionKind::IncrementAutoUploadAttempts, vec![*post_id])
                        .for_action(action),
                )
            }
            _ => Ok(()),
        }
    }

    fn on_change(&self, bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
        let ready = self.apply(event);
        Self::signal_ready(bus, ready, event.trace_context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::storage::MemoryModelStore;

    /// Collects every `Upload` category event.
    #[derive(Default)]
    struct UploadEvents(Mutex<Vec<ChangeEvent>>);

    impl UploadEvents {
        fn causes(&self) -> Vec<(ActionKind, Vec<LocalId>)> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .map(|event| (event.cause, event.affected_ids.clone()))
                .collect()
        }
    }

    impl Handler for UploadEvents {
        fn name(&self) -> &str {
            "upload-events"
        }

        fn on_change(&self, _bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Fixture {
        bus: ActionBus,
        models: Arc<MemoryModelStore>,
        uploads: Arc<UploadCoordinator>,
        events: Arc<UploadEvents>,
    }

    fn fixture() -> Fixture {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let uploads = UploadCoordinator::new(models.clone()).attach(&bus);
        let events = Arc::new(UploadEvents::default());
        bus.register(events.clone(), &[ActionCategory::Upload]);
        Fixture {
            bus,
            models,
            uploads,
            events,
        }
    }

    fn post(id: i64) -> PostModel {
        PostModel::new(LocalId(id), LocalId(1), "post")
    }

    fn media(id: i64) -> MediaModel {
        MediaModel::new(LocalId(id), LocalId(1), "/tmp/photo.jpg", "image/jpeg")
    }

    fn ids(raw: &[i64]) -> BTreeSet<LocalId> {
        raw.iter().copied().map(LocalId).collect()
    }

    fn media_done(bus: &ActionBus, id: i64) {
        bus.publish(ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(id)]))
            .unwrap();
    }

    #[test]
    fn partial_completion_keeps_post_pending() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();

        media_done(&f.bus, 10);

        assert_eq!(f.uploads.uploading_media_for_post(LocalId(1)), ids(&[11]));
        assert_eq!(f.uploads.completed_media_for_post(LocalId(1)), ids(&[10]));
        assert!(f.uploads.is_pending_post(LocalId(1)));
        assert!(f.events.causes().is_empty());
    }

    #[test]
    fn last_completion_signals_ready_then_clear_empties_post() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();
        media_done(&f.bus, 10);
        media_done(&f.bus, 11);

        assert_eq!(
            f.events.causes(),
            vec![(ActionKind::PostReadyToPublish, vec![LocalId(1)])]
        );

        f.uploads.clear_media(&f.bus, LocalId(1), &ids(&[10, 11])).unwrap();

        assert!(f.uploads.associated_media(LocalId(1)).is_empty());
        assert!(f.uploads.media_record(LocalId(10)).is_none());
        assert!(f.uploads.media_record(LocalId(11)).is_none());
        assert_eq!(
            f.events.causes(),
            vec![
                (ActionKind::PostReadyToPublish, vec![LocalId(1)]),
                (ActionKind::ClearMediaForPost, vec![LocalId(1)]),
            ]
        );
    }

    #[test]
    fn post_without_media_is_signalled_on_registration() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[]).unwrap();

        assert_eq!(
            f.events.causes(),
            vec![(ActionKind::PostReadyToPublish, vec![LocalId(1)])]
        );
    }

    #[test]
    fn clearing_failed_media_signals_ready() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();
        media_done(&f.bus, 10);
        f.bus
            .publish(ChangeEvent::failure(
                ActionKind::UploadMedia,
                vec![LocalId(11)],
                ErrorInfo::new(ErrorKind::RequestTooLarge),
            ))
            .unwrap();
        assert!(f.events.causes().is_empty());

        f.uploads.clear_media(&f.bus, LocalId(1), &ids(&[11])).unwrap();

        assert_eq!(
            f.events.causes(),
            vec![
                (ActionKind::ClearMediaForPost, vec![LocalId(1)]),
                (ActionKind::PostReadyToPublish, vec![LocalId(1)]),
            ]
        );
    }

    #[test]
    fn clearing_shared_media_keeps_other_post_waiting() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();
        f.uploads.register_post(&f.bus, &post(2), &[media(10)]).unwrap();

        f.uploads.clear_media(&f.bus, LocalId(1), &ids(&[10])).unwrap();

        assert!(!f.uploads.is_post_ready(LocalId(2)));
        assert_eq!(f.uploads.uploading_media_for_post(LocalId(2)), ids(&[10]));

        media_done(&f.bus, 10);
        assert!(f.uploads.is_post_ready(LocalId(2)));
    }

    /// Fails on the first readiness signal it sees.
    #[derive(Default)]
    struct FailFirstSignal(std::sync::atomic::AtomicBool);

    impl Handler for FailFirstSignal {
        fn name(&self) -> &str {
            "fail-first-signal"
        }

        fn on_change(&self, _bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
            let already = self.0.swap(true, std::sync::atomic::Ordering::SeqCst);
            if event.cause == ActionKind::PostReadyToPublish && !already {
                return Err(SyncError::Storage("observer down".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn failing_observer_does_not_swallow_later_signals() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();
        f.uploads.register_post(&f.bus, &post(2), &[media(10)]).unwrap();
        f.bus
            .register(Arc::new(FailFirstSignal::default()), &[ActionCategory::Upload]);

        let result = f
            .bus
            .publish(ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(10)]));

        assert!(matches!(result, Err(SyncError::Delivery { .. })));
        assert_eq!(
            f.events.causes(),
            vec![
                (ActionKind::PostReadyToPublish, vec![LocalId(1)]),
                (ActionKind::PostReadyToPublish, vec![LocalId(2)]),
            ]
        );
    }

    #[test]
    fn publish_success_deletes_post_record() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[]).unwrap();
        assert!(f.uploads.is_post_ready(LocalId(1)));

        f.bus
            .publish(ChangeEvent::success(ActionKind::PushPost, vec![LocalId(1)]))
            .unwrap();

        assert!(!f.uploads.is_pending_post(LocalId(1)));
        assert!(!f.uploads.all_registered_posts().contains(&LocalId(1)));
    }

    #[test]
    fn publish_failure_keeps_failed_record() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[]).unwrap();

        f.bus
            .publish(ChangeEvent::failure(
                ActionKind::PushPost,
                vec![LocalId(1)],
                ErrorInfo::new(ErrorKind::UnknownPost),
            ))
            .unwrap();

        assert!(f.uploads.is_failed_post(LocalId(1)));
        let record = f.uploads.post_record(LocalId(1)).unwrap();
        assert_eq!(record.error_type(), Some("UnknownPost"));
        assert_eq!(f.uploads.failed_posts(), vec![LocalId(1)]);
        assert_eq!(f.uploads.errors_or_cancellations_count(), 1);

        assert!(f.uploads.clear_post(LocalId(1)));
        assert!(f.uploads.post_record(LocalId(1)).is_none());
    }

    #[test]
    fn cancelled_media_blocks_post_and_second_cancel_is_noop() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();
        f.bus.dispatch(Action::upload_media(media(10))).unwrap();
        f.bus
            .publish(ChangeEvent::progress(ActionKind::UploadMedia, LocalId(10), 0.3))
            .unwrap();
        assert!((f.uploads.media_progress(LocalId(10)) - 0.3).abs() < f32::EPSILON);

        f.bus
            .publish(ChangeEvent::canceled(ActionKind::UploadMedia, vec![LocalId(10)]))
            .unwrap();
        let first = f.uploads.media_record(LocalId(10)).unwrap();
        f.bus
            .publish(ChangeEvent::canceled(ActionKind::UploadMedia, vec![LocalId(10)]))
            .unwrap();

        assert!(first.canceled);
        assert_eq!(f.uploads.media_record(LocalId(10)).unwrap(), first);
        assert!(f.uploads.is_pending_post(LocalId(1)));
        assert!(!f.uploads.is_post_ready(LocalId(1)));
        assert!(f.uploads.uploading_media_for_post(LocalId(1)).is_empty());
        assert_eq!(f.uploads.failed_media_for_post(LocalId(1)), ids(&[10]));
        assert!(f.events.causes().is_empty());
    }

    #[test]
    fn cancel_after_completion_is_ignored() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();
        media_done(&f.bus, 10);

        f.bus
            .publish(ChangeEvent::success(ActionKind::CancelMediaUpload, vec![LocalId(10)]))
            .unwrap();

        let record = f.uploads.media_record(LocalId(10)).unwrap();
        assert_eq!(record.state, MediaUploadState::Completed);
        assert!(!record.canceled);
    }

    #[test]
    fn failed_media_leaves_post_pending() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();

        f.bus
            .publish(ChangeEvent::failure(
                ActionKind::UploadMedia,
                vec![LocalId(10)],
                ErrorInfo::new(ErrorKind::RequestTooLarge),
            ))
            .unwrap();

        assert!(f.uploads.is_pending_post(LocalId(1)));
        assert_eq!(f.uploads.failed_media_for_post(LocalId(1)), ids(&[10]));
        let record = f.uploads.media_record(LocalId(10)).unwrap();
        assert_eq!(record.error.unwrap().kind, ErrorKind::RequestTooLarge);
    }

    #[test]
    fn double_registration_is_rejected_until_resolved() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();

        let err = f.uploads.register_post(&f.bus, &post(1), &[]).unwrap_err();
        assert!(matches!(err, SyncError::AlreadyRegistered { .. }));
        assert_eq!(f.uploads.associated_media(LocalId(1)), ids(&[10]));

        f.bus
            .publish(ChangeEvent::failure(
                ActionKind::PushPost,
                vec![LocalId(1)],
                ErrorInfo::new(ErrorKind::ServerError),
            ))
            .unwrap();
        f.uploads.register_post(&f.bus, &post(1), &[]).unwrap();
        assert!(f.uploads.is_pending_post(LocalId(1)));
        assert!(f.uploads.post_error(LocalId(1)).is_none());
    }

    #[test]
    fn clearing_nothing_still_emits_event() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();

        f.uploads.clear_media(&f.bus, LocalId(1), &BTreeSet::new()).unwrap();

        assert_eq!(f.uploads.associated_media(LocalId(1)), ids(&[10]));
        assert_eq!(
            f.events.causes(),
            vec![(ActionKind::ClearMediaForPost, vec![LocalId(1)])]
        );
    }

    #[test]
    fn upload_actions_drive_the_table() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10)]).unwrap();

        f.bus.dispatch(Action::increment_auto_upload_attempts(LocalId(1))).unwrap();
        f.bus.dispatch(Action::cancel_post(LocalId(1))).unwrap();

        let record = f.uploads.post_record(LocalId(1)).unwrap();
        assert_eq!(record.auto_upload_attempts, 1);
        assert!(f.uploads.is_cancelled_post(LocalId(1)));
        assert_eq!(f.uploads.cancelled_posts(), vec![LocalId(1)]);
    }

    #[test]
    fn deleting_entities_drops_their_records() {
        let f = fixture();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();
        media_done(&f.bus, 10);

        f.bus
            .publish(ChangeEvent::success(ActionKind::RemoveMedia, vec![LocalId(11)]))
            .unwrap();
        assert!(f.uploads.media_record(LocalId(11)).is_none());
        assert_eq!(
            f.events.causes(),
            vec![(ActionKind::PostReadyToPublish, vec![LocalId(1)])]
        );

        f.bus
            .publish(ChangeEvent::success(ActionKind::DeletePost, vec![LocalId(1)]))
            .unwrap();
        assert!(f.uploads.post_record(LocalId(1)).is_none());
        assert!(f.uploads.media_record(LocalId(10)).is_none());
    }

    #[test]
    fn purge_removes_records_of_missing_entities() {
        let f = fixture();
        f.models.upsert_post(&post(1)).unwrap();
        f.models.upsert_media(&media(10)).unwrap();
        f.uploads.register_post(&f.bus, &post(1), &[media(10), media(11)]).unwrap();
        f.uploads.register_post(&f.bus, &post(2), &[]).unwrap();

        let report = f.uploads.purge_orphans().unwrap();

        assert_eq!(report.posts, vec![LocalId(2)]);
        assert_eq!(report.media, vec![LocalId(11)]);
        assert_eq!(f.uploads.all_registered_posts(), vec![LocalId(1)]);
        assert!(f.uploads.purge_orphans().unwrap().is_empty());
    }

    #[test]
    fn progress_of_untracked_media_is_zero() {
        let f = fixture();
        f.bus
            .publish(ChangeEvent::progress(ActionKind::UploadMedia, LocalId(99), 0.5))
            .unwrap();
        assert!(f.uploads.media_progress(LocalId(99)).abs() < f32::EPSILON);
    }
}
