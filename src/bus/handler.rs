//! The handler ("store") interface the bus delivers to.

use crate::bus::action::Action;
use crate::bus::dispatcher::ActionBus;
use crate::bus::event::ChangeEvent;
use crate::domain::Result;

/// A registered receiver of actions and change events.
///
/// Handlers are shared as `Arc<dyn Handler>` and identified by instance, so
/// registering the same `Arc` twice is a no-op. Both callbacks run
/// synchronously on the thread that called `dispatch` or `publish`; a handler
/// may re-enter the bus from inside a callback.
///
/// Handlers that keep state need interior mutability, and must not hold their
/// own locks while calling back into the bus.
pub trait Handler: Send + Sync {
    /// Name used in logs and delivery errors.
    fn name(&self) -> &str;

    /// Called for every dispatched action in a category the handler registered for.
    ///
    /// # Errors
    ///
    /// An error is reported to the dispatch caller after the remaining
    /// handlers have been offered the action.
    fn on_action(&self, bus: &ActionBus, action: &Action) -> Result<()> {
        let _ = (bus, action);
        Ok(())
    }

    /// Called for every published event in a category the handler registered for.
    ///
    /// # Errors
    ///
    /// An error is reported to the publish caller after the remaining
    /// handlers have been offered the event.
    fn on_change(&self, bus: &ActionBus, event: &ChangeEvent) -> Result<()> {
        let _ = (bus, event);
        Ok(())
    }
}
