//! Entity stores.
//!
//! [`PostStore`] and [`MediaStore`] are the bus handlers that own the post
//! and media categories. Local actions are applied to the [`ModelStore`]
//! directly and resolved with a change event; remote actions are forwarded
//! to a [`RemoteClient`], which resolves them when the network answers.
//!
//! [`ModelStore`]: crate::storage::ModelStore

pub mod media;
pub mod post;
pub mod remote;

pub use media::MediaStore;
pub use post::PostStore;
pub use remote::RemoteClient;

use crate::bus::{Action, ActionBus, ChangeEvent};
use crate::domain::{ErrorInfo, ErrorKind, Result};

/// Publishes the event resolving a local `action` whose model store work
/// ended with `outcome`.
///
/// A storage failure becomes an error event rather than a handler failure,
/// so whoever waits on the action sees it resolve either way.
fn resolve_local(bus: &ActionBus, action: &Action, outcome: Result<()>) -> Result<()> {
    let event = match outcome {
        Ok(()) => ChangeEvent::success(action.kind(), action.targets()),
        Err(error) => {
            tracing::warn!(action_id = %action.id(), error = %error, "local action failed");
            ChangeEvent::failure(
                action.kind(),
                action.targets(),
                ErrorInfo::new(ErrorKind::Other("StorageError".to_string())).with_message(error.to_string()),
            )
        }
    };
    bus.publish(event.for_action(action))
}
