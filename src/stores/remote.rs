//! Seam between the stores and the network.

use crate::bus::{Action, ActionBus};
use crate::domain::Result;

/// Performs remote work on behalf of a store.
///
/// `execute` is called synchronously from inside the bus delivery. An
/// implementation typically hands the action to its own worker and returns;
/// once the outcome is known it reports back with [`ActionBus::publish`],
/// setting `cause` to the action's kind, `affected_ids` to every local id it
/// resolved and `error` on failure. Tying the event to the action with
/// [`ChangeEvent::for_action`](crate::bus::ChangeEvent::for_action) lets the
/// bus resolve that exact action's follow-up.
///
/// The bus handle is cheap to clone, so a worker thread can keep its own.
pub trait RemoteClient: Send + Sync {
    /// Starts the remote side of `action`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the request could not be started at all.
    /// Failures of the request itself are reported as error events.
    fn execute(&self, bus: &ActionBus, action: &Action) -> Result<()>;
}
