//! "Do next only on success" resolution.
//!
//! When an action with a follow-up is dispatched, the bus records a
//! [`PendingChain`]. Every terminal change event is then run through
//! [`resolve`], a pure function that decides which pending entries the event
//! settles and whether their follow-ups should run. Matching is exact when the
//! event carries an action id; otherwise the event's cause must equal the
//! action kind and its affected ids must cover the action's targets. Pending
//! entries without targets are settled one at a time, oldest first.
//!
//! Results are always reported in submission order, never completion order.

use crate::bus::action::{Action, ActionKind};
use crate::bus::event::ChangeEvent;
use crate::domain::{ActionId, LocalId};
use std::sync::Arc;

/// A dispatched action waiting for its resolving event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChain {
    /// Id of the dispatched action.
    pub action_id: ActionId,
    /// Kind of the dispatched action.
    pub cause: ActionKind,
    /// Local ids the action resolves.
    pub targets: Vec<LocalId>,
    /// Follow-up to dispatch on success.
    pub next: Arc<Action>,
}

impl PendingChain {
    /// Builds the pending entry for `action`, or `None` if it has no follow-up.
    #[must_use]
    pub fn for_action(action: &Action) -> Option<Self> {
        action.next_on_success_shared().map(|next| Self {
            action_id: action.id(),
            cause: action.kind(),
            targets: action.targets(),
            next,
        })
    }
}

/// Positions in the pending list settled by one event, in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Entries whose follow-up must be dispatched.
    pub continued: Vec<usize>,
    /// Entries whose chain is dropped.
    pub abandoned: Vec<usize>,
}

impl Resolution {
    /// True when the event settles nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.continued.is_empty() && self.abandoned.is_empty()
    }
}

/// Decides which pending chains `event` settles.
#[must_use]
pub fn resolve(pending: &[PendingChain], event: &ChangeEvent) -> Resolution {
    if !event.is_terminal() {
        return Resolution::default();
    }

    let matched: Vec<usize> = if let Some(action_id) = event.action_id {
        pending
            .iter()
            .position(|entry| entry.action_id == action_id)
            .into_iter()
            .collect()
    } else {
        let mut untargeted_taken = false;
        pending
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.cause == event.cause)
            .filter(|(_, entry)| {
                if entry.targets.is_empty() {
                    let first = !untargeted_taken;
                    untargeted_taken = true;
                    first
                } else {
                    entry
                        .targets
                        .iter()
                        .all(|target| event.affected_ids.contains(target))
                }
            })
            .map(|(position, _)| position)
            .collect()
    };

    if event.is_success() {
        Resolution {
            continued: matched,
            abandoned: Vec::new(),
        }
    } else {
        Resolution {
            continued: Vec::new(),
            abandoned: matched,
        }
    }
}

/// Removes the entries named by `resolution` and returns the follow-ups to
/// dispatch, in submission order, together with the number abandoned.
pub fn take_resolved(
    pending: &mut Vec<PendingChain>,
    resolution: &Resolution,
) -> (Vec<Arc<Action>>, usize) {
    let continued: Vec<Arc<Action>> = resolution
        .continued
        .iter()
        .filter_map(|&position| pending.get(position).map(|entry| Arc::clone(&entry.next)))
        .collect();

    let mut settled: Vec<usize> = resolution
        .continued
        .iter()
        .chain(resolution.abandoned.iter())
        .copied()
        .collect();
    settled.sort_unstable();
    settled.dedup();
    for position in settled.into_iter().rev() {
        if position < pending.len() {
            pending.remove(position);
        }
    }

    (continued, resolution.abandoned.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorInfo, ErrorKind, MediaModel, PostModel};

    fn media(id: i64) -> MediaModel {
        MediaModel::new(LocalId(id), LocalId(1), "/f.jpg", "image/jpeg")
    }

    fn post(id: i64) -> PostModel {
        PostModel::new(LocalId(id), LocalId(1), "p")
    }

    fn pending_upload(media_id: i64, post_id: i64) -> PendingChain {
        let action = Action::upload_media(media(media_id)).then(Action::push_post(post(post_id)));
        PendingChain::for_action(&action).unwrap()
    }

    #[test]
    fn no_pending_entry_without_follow_up() {
        assert!(PendingChain::for_action(&Action::fetch_post(LocalId(1))).is_none());
    }

    #[test]
    fn success_continues_matching_entry() {
        let pending = vec![pending_upload(1, 10), pending_upload(2, 20)];
        let event = ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(2)]);

        let resolution = resolve(&pending, &event);
        assert_eq!(resolution.continued, vec![1]);
        assert!(resolution.abandoned.is_empty());
    }

    #[test]
    fn error_abandons_matching_entry() {
        let pending = vec![pending_upload(1, 10)];
        let event = ChangeEvent::failure(
            ActionKind::UploadMedia,
            vec![LocalId(1)],
            ErrorInfo::new(ErrorKind::RequestTooLarge),
        );

        let resolution = resolve(&pending, &event);
        assert!(resolution.continued.is_empty());
        assert_eq!(resolution.abandoned, vec![0]);
    }

    #[test]
    fn progress_settles_nothing() {
        let pending = vec![pending_upload(1, 10)];
        let event = ChangeEvent::progress(ActionKind::UploadMedia, LocalId(1), 0.5);
        assert!(resolve(&pending, &event).is_empty());
    }

    #[test]
    fn cancel_abandons() {
        let pending = vec![pending_upload(1, 10)];
        let event = ChangeEvent::canceled(ActionKind::UploadMedia, vec![LocalId(1)]);
        assert_eq!(resolve(&pending, &event).abandoned, vec![0]);
    }

    #[test]
    fn different_cause_does_not_match() {
        let pending = vec![pending_upload(1, 10)];
        let event = ChangeEvent::success(ActionKind::UpdateMedia, vec![LocalId(1)]);
        assert!(resolve(&pending, &event).is_empty());
    }

    #[test]
    fn action_id_matches_exactly() {
        let first = Action::upload_media(media(1)).then(Action::push_post(post(10)));
        let second = Action::upload_media(media(1)).then(Action::push_post(post(20)));
        let pending = vec![
            PendingChain::for_action(&first).unwrap(),
            PendingChain::for_action(&second).unwrap(),
        ];

        let event = ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(1)]).for_action(&second);
        assert_eq!(resolve(&pending, &event).continued, vec![1]);
    }

    #[test]
    fn simultaneous_resolution_follows_submission_order() {
        let pending = vec![pending_upload(2, 20), pending_upload(1, 10)];
        let event = ChangeEvent::success(ActionKind::UploadMedia, vec![LocalId(1), LocalId(2)]);

        let resolution = resolve(&pending, &event);
        assert_eq!(resolution.continued, vec![0, 1]);

        let mut pending = pending;
        let (next, abandoned) = take_resolved(&mut pending, &resolution);
        let order: Vec<Vec<LocalId>> = next.iter().map(|action| action.targets()).collect();
        assert_eq!(order, vec![vec![LocalId(20)], vec![LocalId(10)]]);
        assert_eq!(abandoned, 0);
        assert!(pending.is_empty());
    }

    #[test]
    fn take_resolved_keeps_unsettled_entries() {
        let mut pending = vec![pending_upload(1, 10), pending_upload(2, 20), pending_upload(3, 30)];
        let resolution = Resolution {
            continued: vec![2],
            abandoned: vec![0],
        };

        let (next, abandoned) = take_resolved(&mut pending, &resolution);
        assert_eq!(next.len(), 1);
        assert_eq!(abandoned, 1);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].targets, vec![LocalId(2)]);
    }
}
