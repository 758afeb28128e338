//! Domain layer: identifiers, entity models and the error taxonomy.
//!
//! These types are independent of the bus and the coordinator and are shared
//! by every other layer of the crate.
//!
//! # Organization
//!
//! - [`error`]: crate error type, result alias, and event error detail
//! - [`ids`]: [`LocalId`] and [`ActionId`] newtypes
//! - [`model`]: post and media entity models
//!
//! # Examples
//!
//! ```
//! use sitesync::domain::{LocalId, PostModel};
//!
//! let post = PostModel::new(LocalId(7), LocalId(1), "Hello");
//! assert!(post.is_local_draft);
//! ```

pub mod error;
pub mod ids;
pub mod model;

pub use error::{ErrorInfo, ErrorKind, Result, SyncError};
pub use ids::{ActionId, LocalId};
pub use model::{MediaModel, PostModel};
