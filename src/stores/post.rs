//! Post store.

use crate::bus::{Action, ActionBus, ActionCategory, ActionKind, ActionPayload, ChangeEvent, Handler};
use crate::domain::Result;
use crate::storage::ModelStore;
use crate::stores::{resolve_local, RemoteClient};
use std::sync::Arc;

/// Handler of the `Post` category.
///
/// | action        | handled by                         |
/// |---------------|------------------------------------|
/// | `UpdatePost`  | model store upsert, resolved here  |
/// | `RemovePost`  | model store delete, resolved here  |
/// | `FetchPost`   | remote client                      |
/// | `PushPost`    | remote client                      |
/// | `DeletePost`  | remote client, then local delete   |
pub struct PostStore {
    models: Arc<dyn ModelStore>,
    remote: Arc<dyn RemoteClient>,
}

impl PostStore {
    #[must_use]
    pub fn new(models: Arc<dyn ModelStore>, remote: Arc<dyn RemoteClient>) -> Self {
        Self { models, remote }
    }

    /// Registers the store on the `Post` category of `bus`.
    #[must_use]
    pub fn attach(self, bus: &ActionBus) -> Arc<Self> {
        let store = Arc::new(self);
        bus.register(store.clone(), &[ActionCategory::Post]);
        store
    }
}

impl Handler for PostStore {
    fn name(&self) -> &str {
        "post-store"
    }

    fn on_action(&self, bus: &ActionBus, action: &Action) -> Result<()> {
        match action.payload() {
            ActionPayload::UpdatePost { post } => {
                let mut post = post.clone();
                post.modified_at = chrono::Utc::now().timestamp();
                resolve_local(bus, action, self.models.upsert_post(&post))
            }
            ActionPayload::RemovePost { post_id } => {
                let outcome = self.models.delete_post(*post_id).map(|existed| {
                    tracing::debug!(%post_id, existed, "post removed locally");
                });
                resolve_local(bus, action, outcome)
            }
            ActionPayload::FetchPost { .. } | ActionPayload::PushPost { .. } | ActionPayload::DeletePost { .. } => {
                tracing::debug!(action_id = %action.id(), kind = ?action.kind(), "forwarding to remote");
                self.remote.execute(bus, action)
            }
            _ => Ok(()),
        }
    }

    fn on_change(&self, _bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
        if !event.is_success() {
            return Ok(());
        }

        match event.cause {
            ActionKind::DeletePost => {
                for &post_id in &event.affected_ids {
                    self.models.delete_post(post_id)?;
                }
            }
            ActionKind::PushPost => {
                for &post_id in &event.affected_ids {
                    if let Some(mut post) = self.models.get_post(post_id)? {
                        if post.is_local_draft {
                            post.is_local_draft = false;
                            self.models.upsert_post(&post)?;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocalId, PostModel};
    use crate::storage::MemoryModelStore;
    use crate::stores::testing::ScriptedRemote;

    fn setup(remote: Arc<ScriptedRemote>) -> (ActionBus, Arc<MemoryModelStore>) {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let _store = PostStore::new(models.clone(), remote).attach(&bus);
        (bus, models)
    }

    #[test]
    fn update_then_push_reaches_remote_after_save() {
        let remote = Arc::new(ScriptedRemote::succeeding());
        let (bus, models) = setup(remote.clone());
        let post = PostModel::new(LocalId(1), LocalId(1), "draft");

        bus.dispatch(Action::update_post(post.clone()).then(Action::push_post(post)))
            .unwrap();

        assert_eq!(remote.seen(), vec![ActionKind::PushPost]);
        assert!(!models.get_post(LocalId(1)).unwrap().unwrap().is_local_draft);
        assert_eq!(bus.pending_chains(), 0);
    }

    #[test]
    fn remote_delete_removes_local_post() {
        let remote = Arc::new(ScriptedRemote::succeeding());
        let (bus, models) = setup(remote);
        models
            .upsert_post(&PostModel::new(LocalId(1), LocalId(1), "gone"))
            .unwrap();

        bus.dispatch(Action::delete_post(LocalId(1))).unwrap();

        assert!(models.get_post(LocalId(1)).unwrap().is_none());
    }

    #[test]
    fn failed_remote_delete_keeps_local_post() {
        let remote = Arc::new(ScriptedRemote::failing());
        let (bus, models) = setup(remote);
        models
            .upsert_post(&PostModel::new(LocalId(1), LocalId(1), "kept"))
            .unwrap();

        bus.dispatch(Action::delete_post(LocalId(1))).unwrap();

        assert!(models.get_post(LocalId(1)).unwrap().is_some());
    }

    #[test]
    fn remove_is_local_only() {
        let remote = Arc::new(ScriptedRemote::succeeding());
        let (bus, models) = setup(remote.clone());
        models
            .upsert_post(&PostModel::new(LocalId(1), LocalId(1), "local"))
            .unwrap();

        bus.dispatch(Action::remove_post(LocalId(1))).unwrap();

        assert!(models.get_post(LocalId(1)).unwrap().is_none());
        assert!(remote.seen().is_empty());
    }
}
