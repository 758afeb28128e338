//! The process-wide action bus.
//!
//! [`ActionBus`] keeps one ordered handler list per [`ActionCategory`] and
//! delivers actions and change events synchronously on the caller's thread.
//!
//! # Locking
//!
//! Each category list sits behind its own `RwLock`, so registry changes are
//! exclusive with deliveries of that category only. A delivery copies the list
//! under the read lock and calls handlers after releasing it, which lets a
//! handler dispatch or publish again from inside its callback. Every
//! registration carries an `active` flag that is checked right before each
//! call; once [`ActionBus::unregister`] returns, the handler is never called
//! again.
//!
//! # Chains
//!
//! Dispatching an action with a follow-up records a pending chain. After an
//! event has been delivered to every subscriber, the bus settles the chains it
//! resolves and dispatches their follow-ups, in submission order.

use crate::bus::action::{Action, ActionCategory};
use crate::bus::chain::{self, PendingChain};
use crate::bus::event::ChangeEvent;
use crate::bus::handler::Handler;
use crate::domain::{ErrorInfo, ErrorKind, Result, SyncError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

struct Registration {
    handler: Arc<dyn Handler>,
    active: AtomicBool,
}

impl Registration {
    fn is(&self, handler: &Arc<dyn Handler>) -> bool {
        same_handler(&self.handler, handler)
    }
}

fn same_handler(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

type HandlerList = RwLock<Vec<Arc<Registration>>>;

struct BusInner {
    registry: [HandlerList; ActionCategory::ALL.len()],
    pending: Mutex<Vec<PendingChain>>,
}

/// Routes actions and change events to registered handlers.
///
/// Cloning the bus is cheap and yields a handle to the same registry, which is
/// how remote clients keep a way back onto the bus from a worker thread.
///
/// # Example
///
/// ```
/// use sitesync::bus::{Action, ActionBus, ActionCategory, Handler};
/// use sitesync::domain::{LocalId, Result};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// struct Counter(AtomicUsize);
///
/// impl Handler for Counter {
///     fn name(&self) -> &str {
///         "counter"
///     }
///
///     fn on_action(&self, _bus: &ActionBus, _action: &Action) -> Result<()> {
///         self.0.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let bus = ActionBus::new();
/// let counter = Arc::new(Counter(AtomicUsize::new(0)));
/// bus.register(counter.clone(), &[ActionCategory::Post]);
///
/// bus.dispatch(Action::fetch_post(LocalId(1)))?;
/// bus.dispatch(Action::fetch_site(LocalId(1)))?;
/// assert_eq!(counter.0.load(Ordering::SeqCst), 1);
/// # Ok::<(), sitesync::SyncError>(())
/// ```
#[derive(Clone)]
pub struct ActionBus {
    inner: Arc<BusInner>,
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBus")
            .field("pending_chains", &self.pending_chains())
            .finish_non_exhaustive()
    }
}

impl ActionBus {
    /// Creates a bus with empty handler lists.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: std::array::from_fn(|_| RwLock::new(Vec::new())),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds `handler` to the delivery list of each category.
    ///
    /// Categories the handler is already registered for are left untouched,
    /// keeping its original position.
    pub fn register(&self, handler: Arc<dyn Handler>, categories: &[ActionCategory]) {
        for &category in categories {
            let mut list = self.inner.registry[category.index()]
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            if list.iter().any(|registration| registration.is(&handler)) {
                tracing::trace!(handler = handler.name(), ?category, "handler already registered");
                continue;
            }

            list.push(Arc::new(Registration {
                handler: Arc::clone(&handler),
                active: AtomicBool::new(true),
            }));
            tracing::debug!(
                handler = handler.name(),
                ?category,
                position = list.len(),
                "handler registered"
            );
        }
    }

    /// Removes `handler` from every category.
    ///
    /// Returns `true` if it was registered anywhere. After this returns the
    /// handler receives no further deliveries, including from deliveries that
    /// already copied the list.
    pub fn unregister(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut removed = false;

        for list in &self.inner.registry {
            let mut list = list.write().unwrap_or_else(PoisonError::into_inner);
            list.retain(|registration| {
                if registration.is(handler) {
                    registration.active.store(false, Ordering::SeqCst);
                    removed = true;
                    false
                } else {
                    true
                }
            });
        }

        tracing::debug!(handler = handler.name(), removed, "handler unregistered");
        removed
    }

    /// Number of handlers registered for `category`.
    #[must_use]
    pub fn handler_count(&self, category: ActionCategory) -> usize {
        self.inner.registry[category.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of dispatched actions whose follow-up is still waiting.
    #[must_use]
    pub fn pending_chains(&self) -> usize {
        self.lock_pending().len()
    }

    /// Delivers `action` to every handler of its category, in registration order.
    ///
    /// A malformed action is not delivered; the bus publishes a
    /// `MalformedPayload` failure event for it instead, and its chain is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Delivery`] if any handler failed. All handlers are
    /// offered the action before the error is returned, and its chain is
    /// dropped.
    pub fn dispatch(&self, action: Action) -> Result<()> {
        let span = tracing::debug_span!(
            "dispatch",
            action_id = %action.id(),
            kind = ?action.kind(),
            chained = action.next_on_success().is_some()
        );
        let _guard = span.entered();

        if let Err(reason) = action.validate() {
            tracing::warn!(reason = %reason, "malformed action, reporting failure");
            let event = ChangeEvent::failure(
                action.kind(),
                action.targets(),
                ErrorInfo::new(ErrorKind::MalformedPayload).with_message(reason),
            )
            .for_action(&action);
            return self.publish(event);
        }

        if let Some(entry) = PendingChain::for_action(&action) {
            self.lock_pending().push(entry);
        }

        let failures = self.deliver(action.category(), |handler| handler.on_action(self, &action));
        if !failures.is_empty() {
            let action_id = action.id();
            let mut pending = self.lock_pending();
            let before = pending.len();
            pending.retain(|entry| entry.action_id != action_id);
            if pending.len() < before {
                tracing::debug!("chain dropped after failed delivery");
            }
        }
        Self::finish(|| format!("{:?} {}", action.kind(), action.id()), failures)
    }

    /// Broadcasts `event` to every handler of its category, then settles the
    /// chains it resolves.
    ///
    /// Follow-up actions are dispatched only after every subscriber has seen
    /// the event.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Delivery`] if any handler failed, including
    /// handlers of dispatched follow-ups.
    pub fn publish(&self, event: ChangeEvent) -> Result<()> {
        let _context = event.trace_context.as_ref().and_then(|context| context.attach());

        let span = tracing::debug_span!(
            "publish",
            cause = ?event.cause,
            category = ?event.category,
            stage = ?event.stage,
            is_error = event.is_error()
        );
        let _guard = span.entered();

        let mut failures = self.deliver(event.category, |handler| handler.on_change(self, &event));

        let continuations = {
            let mut pending = self.lock_pending();
            let resolution = chain::resolve(&pending, &event);
            if resolution.is_empty() {
                Vec::new()
            } else {
                let (next, abandoned) = chain::take_resolved(&mut pending, &resolution);
                if abandoned > 0 {
                    tracing::debug!(abandoned, "chain abandoned after failed resolution");
                }
                next
            }
        };

        for next in continuations {
            tracing::debug!(next_id = %next.id(), next_kind = ?next.kind(), "dispatching chained action");
            if let Err(error) = self.dispatch(Action::clone(&next)) {
                failures.push(error);
            }
        }

        Self::finish(|| format!("{:?} event", event.cause), failures)
    }

    fn deliver<F>(&self, category: ActionCategory, mut call: F) -> Vec<SyncError>
    where
        F: FnMut(&dyn Handler) -> Result<()>,
    {
        let snapshot: Vec<Arc<Registration>> = self.inner.registry[category.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::trace!(?category, handlers = snapshot.len(), "delivering");

        let mut failures = Vec::new();
        for registration in snapshot {
            if !registration.active.load(Ordering::SeqCst) {
                continue;
            }

            let handler = registration.handler.as_ref();
            if let Err(error) = call(handler) {
                tracing::warn!(handler = handler.name(), error = %error, "handler failed");
                failures.push(match error {
                    error @ SyncError::Handler { .. } => error,
                    other => SyncError::handler(handler.name(), other),
                });
            }
        }
        failures
    }

    fn finish(subject: impl FnOnce() -> String, failures: Vec<SyncError>) -> Result<()> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Delivery {
                subject: subject(),
                failures,
            })
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<PendingChain>> {
        self.inner.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
