//! Change events broadcast after an action resolves or makes progress.

use crate::bus::action::{Action, ActionCategory, ActionKind};
use crate::bus::trace::TraceContext;
use crate::domain::{ActionId, ErrorInfo, LocalId};
use serde::{Deserialize, Serialize};

/// How far the causing action has come.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// The action finished, successfully or with an error.
    Resolved,
    /// The action is still running; the value is the completed fraction in `[0, 1]`.
    Progress(f32),
    /// The action was cancelled before finishing.
    Canceled,
}

/// A read-only notification delivered to every handler of its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Registry category the event is delivered to.
    pub category: ActionCategory,

    /// Kind of action that produced the event.
    pub cause: ActionKind,

    /// Exact action this event resolves, when the reporter knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<ActionId>,

    /// Resolution stage.
    pub stage: Stage,

    /// Failure detail; `Some` marks the event as an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// Every local id resolved or updated by this event.
    pub affected_ids: Vec<LocalId>,

    /// Trace context of the causing action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<TraceContext>,
}

impl ChangeEvent {
    fn with_stage(cause: ActionKind, affected_ids: Vec<LocalId>, stage: Stage) -> Self {
        Self {
            category: cause.category(),
            cause,
            action_id: None,
            stage,
            error: None,
            affected_ids,
            trace_context: None,
        }
    }

    /// A successful resolution.
    #[must_use]
    pub fn success(cause: ActionKind, affected_ids: Vec<LocalId>) -> Self {
        Self::with_stage(cause, affected_ids, Stage::Resolved)
    }

    /// A failed resolution.
    #[must_use]
    pub fn failure(cause: ActionKind, affected_ids: Vec<LocalId>, error: ErrorInfo) -> Self {
        let mut event = Self::with_stage(cause, affected_ids, Stage::Resolved);
        event.error = Some(error);
        event
    }

    /// A progress update for a single entity. The fraction is clamped to `[0, 1]`.
    #[must_use]
    pub fn progress(cause: ActionKind, id: LocalId, fraction: f32) -> Self {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        Self::with_stage(cause, vec![id], Stage::Progress(fraction))
    }

    /// A cancellation.
    #[must_use]
    pub fn canceled(cause: ActionKind, affected_ids: Vec<LocalId>) -> Self {
        Self::with_stage(cause, affected_ids, Stage::Canceled)
    }

    /// Ties the event to the action it reports on.
    #[must_use]
    pub fn for_action(mut self, action: &Action) -> Self {
        self.action_id = Some(action.id());
        self.trace_context = action.trace_context().cloned();
        self
    }

    /// Delivers the event to a different category than its cause's.
    #[must_use]
    pub fn in_category(mut self, category: ActionCategory) -> Self {
        self.category = category;
        self
    }

    /// True when the event reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when the event ends the causing action (success, error or cancel).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.stage, Stage::Progress(_))
    }

    /// True for a resolution without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.stage, Stage::Resolved) && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn failure_is_terminal_error() {
        let event = ChangeEvent::failure(
            ActionKind::PushPost,
            vec![LocalId(1)],
            ErrorInfo::new(ErrorKind::UnknownPost),
        );
        assert!(event.is_error());
        assert!(event.is_terminal());
        assert!(!event.is_success());
        assert_eq!(event.category, ActionCategory::Post);
    }

    #[test]
    fn progress_is_clamped_and_not_terminal() {
        let event = ChangeEvent::progress(ActionKind::UploadMedia, LocalId(3), 1.7);
        assert_eq!(event.stage, Stage::Progress(1.0));
        assert!(!event.is_terminal());

        let event = ChangeEvent::progress(ActionKind::UploadMedia, LocalId(3), f32::NAN);
        assert_eq!(event.stage, Stage::Progress(0.0));
    }

    #[test]
    fn canceled_is_terminal_but_not_success() {
        let event = ChangeEvent::canceled(ActionKind::UploadMedia, vec![LocalId(3)]);
        assert!(event.is_terminal());
        assert!(!event.is_success());
        assert!(!event.is_error());
    }

    #[test]
    fn for_action_copies_identity() {
        let action = Action::fetch_site(LocalId(2));
        let event = ChangeEvent::success(ActionKind::FetchSite, vec![LocalId(2)]).for_action(&action);
        assert_eq!(event.action_id, Some(action.id()));
    }
}
