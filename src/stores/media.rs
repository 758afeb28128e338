//! Media store.

use crate::bus::{Action, ActionBus, ActionCategory, ActionKind, ActionPayload, ChangeEvent, Handler};
use crate::domain::Result;
use crate::storage::ModelStore;
use crate::stores::{resolve_local, RemoteClient};
use std::sync::Arc;

/// Handler of the `Media` category.
///
/// `UpdateMedia` and `RemoveMedia` are applied to the model store and
/// resolved here. `UploadMedia`, `DeleteMedia` and `CancelMediaUpload` go to
/// the remote client. A cancel with `delete` set also removes the local
/// entity and reports that as a `RemoveMedia` success.
pub struct MediaStore {
    models: Arc<dyn ModelStore>,
    remote: Arc<dyn RemoteClient>,
}

impl MediaStore {
    #[must_use]
    pub fn new(models: Arc<dyn ModelStore>, remote: Arc<dyn RemoteClient>) -> Self {
        Self { models, remote }
    }

    /// Registers the store on the `Media` category of `bus`.
    #[must_use]
    pub fn attach(self, bus: &ActionBus) -> Arc<Self> {
        let store = Arc::new(self);
        bus.register(store.clone(), &[ActionCategory::Media]);
        store
    }
}

impl Handler for MediaStore {
    fn name(&self) -> &str {
        "media-store"
    }

    fn on_action(&self, bus: &ActionBus, action: &Action) -> Result<()> {
        match action.payload() {
            ActionPayload::UpdateMedia { media } => resolve_local(bus, action, self.models.upsert_media(media)),
            ActionPayload::RemoveMedia { media_id } => {
                let outcome = self.models.delete_media(*media_id).map(|existed| {
                    tracing::debug!(%media_id, existed, "media removed locally");
                });
                resolve_local(bus, action, outcome)
            }
            ActionPayload::CancelMediaUpload { media_id, delete } => {
                self.remote.execute(bus, action)?;
                if *delete {
                    self.models.delete_media(*media_id)?;
                    bus.publish(ChangeEvent::success(ActionKind::RemoveMedia, vec![*media_id]))?;
                }
                Ok(())
            }
            ActionPayload::UploadMedia { media } => {
                self.models.upsert_media(media)?;
                self.remote.execute(bus, action)
            }
            ActionPayload::DeleteMedia { .. } => self.remote.execute(bus, action),
            _ => Ok(()),
        }
    }

    fn on_change(&self, _bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
        if event.cause == ActionKind::DeleteMedia && event.is_success() {
            for &media_id in &event.affected_ids {
                self.models.delete_media(media_id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LocalId, MediaModel};
    use crate::storage::MemoryModelStore;
    use crate::stores::testing::ScriptedRemote;
    use crate::uploads::UploadCoordinator;

    fn photo(id: i64) -> MediaModel {
        MediaModel::new(LocalId(id), LocalId(1), "/tmp/photo.jpg", "image/jpeg")
    }

    #[test]
    fn upload_saves_entity_and_reaches_remote() {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let remote = Arc::new(ScriptedRemote::succeeding());
        let _store = MediaStore::new(models.clone(), remote.clone()).attach(&bus);

        bus.dispatch(Action::upload_media(photo(3))).unwrap();

        assert!(models.get_media(LocalId(3)).unwrap().is_some());
        assert_eq!(remote.seen(), vec![ActionKind::UploadMedia]);
    }

    #[test]
    fn cancel_with_delete_drops_entity_and_record() {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let remote = Arc::new(ScriptedRemote::silent());
        let uploads = UploadCoordinator::new(models.clone()).attach(&bus);
        let _store = MediaStore::new(models.clone(), remote).attach(&bus);

        bus.dispatch(Action::upload_media(photo(3))).unwrap();
        assert!(uploads.media_record(LocalId(3)).is_some());

        bus.dispatch(Action::cancel_media_upload(LocalId(3), true)).unwrap();

        assert!(models.get_media(LocalId(3)).unwrap().is_none());
        assert!(uploads.media_record(LocalId(3)).is_none());
    }

    #[test]
    fn remote_delete_removes_local_media() {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let _store = MediaStore::new(models.clone(), Arc::new(ScriptedRemote::succeeding())).attach(&bus);
        models.upsert_media(&photo(4)).unwrap();

        bus.dispatch(Action::delete_media(LocalId(4))).unwrap();

        assert!(models.get_media(LocalId(4)).unwrap().is_none());
    }

    #[test]
    fn update_is_resolved_locally() {
        let bus = ActionBus::new();
        let models = Arc::new(MemoryModelStore::new());
        let remote = Arc::new(ScriptedRemote::succeeding());
        let _store = MediaStore::new(models.clone(), remote.clone()).attach(&bus);

        bus.dispatch(Action::update_media(photo(5)).then(Action::delete_media(LocalId(5))))
            .unwrap();

        assert_eq!(remote.seen(), vec![ActionKind::DeleteMedia]);
        assert!(models.get_media(LocalId(5)).unwrap().is_none());
    }
}
