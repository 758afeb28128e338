//! Automatic publishing of ready posts.

use crate::bus::{Action, ActionBus, ActionCategory, ActionKind, ChangeEvent, Handler};
use crate::domain::Result;
use crate::storage::ModelStore;
use std::sync::Arc;

/// Dispatches `PushPost` for every post the coordinator reports as ready.
///
/// The post is loaded from the model store at the time of the signal, so the
/// pushed content is whatever was saved last. A ready post that is no longer
/// in the store is skipped.
pub struct AutoPublisher {
    models: Arc<dyn ModelStore>,
}

impl AutoPublisher {
    /// Creates a publisher reading posts from `models`.
    #[must_use]
    pub fn new(models: Arc<dyn ModelStore>) -> Self {
        Self { models }
    }

    /// Registers the publisher on the `Upload` category of `bus`.
    #[must_use]
    pub fn attach(self, bus: &ActionBus) -> Arc<Self> {
        let publisher = Arc::new(self);
        bus.register(publisher.clone(), &[ActionCategory::Upload]);
        publisher
    }
}

impl Handler for AutoPublisher {
    fn name(&self) -> &str {
        "auto-publisher"
    }

    fn on_change(&self, bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
        if event.cause != ActionKind::PostReadyToPublish || !event.is_success() {
            return Ok(());
        }

        for &post_id in &event.affected_ids {
            match self.models.get_post(post_id)? {
                Some(post) => {
                    tracing::debug!(%post_id, "publishing ready post");
                    bus.dispatch(Action::push_post(post))?;
                }
                None => tracing::warn!(%post_id, "ready post missing from model store"),
            }
        }
        Ok(())
    }
}
