//! Action dispatch layer.
//!
//! Producers submit [`Action`]s; the [`ActionBus`] delivers each one to the
//! [`Handler`]s registered for its [`ActionCategory`]. Handlers (and remote
//! clients acting for them) report outcomes as [`ChangeEvent`]s through the
//! same bus, which also runs an action's follow-up once the action succeeds.
//!
//! ```text
//! caller ──dispatch(Action)──► ActionBus ──on_action──► handlers of category
//!                                  ▲                         │
//!                                  │                  remote client / store
//!                                  │                         │
//!        follow-up on success ◄────┴──publish(ChangeEvent)◄──┘
//!                                  │
//!                                  └──on_change──► handlers of category
//! ```
//!
//! # Modules
//!
//! - [`action`]: action payloads, kinds and categories
//! - [`event`]: change events and resolution stages
//! - [`handler`]: the [`Handler`] trait
//! - [`dispatcher`]: the [`ActionBus`] registry and delivery
//! - [`chain`]: the pure follow-up resolver
//! - [`trace`]: cross-thread tracing context

pub mod action;
pub mod chain;
pub mod dispatcher;
pub mod event;
pub mod handler;
pub mod trace;

pub use action::{Action, ActionCategory, ActionKind, ActionPayload};
pub use chain::PendingChain;
pub use dispatcher::ActionBus;
pub use event::{ChangeEvent, Stage};
pub use handler::Handler;
pub use trace::TraceContext;
