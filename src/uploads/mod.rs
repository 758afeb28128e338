//! Upload tracking for posts and their media.
//!
//! A post that embeds media cannot be published until those uploads finish.
//! The [`UploadCoordinator`] keeps one record per waiting post and per
//! in-flight media item, follows the change events the remote side reports,
//! and publishes a readiness signal once a post has nothing left to wait for.
//! [`AutoPublisher`] is the optional handler that acts on that signal.
//!
//! # Modules
//!
//! - `records`: record types and their states
//! - `table`: [`UploadTable`], the indexed in-memory table
//! - `coordinator`: [`UploadCoordinator`], the bus handler
//! - `auto_publish`: [`AutoPublisher`]

pub mod auto_publish;
pub mod coordinator;
pub mod records;
pub mod table;

pub use auto_publish::AutoPublisher;
pub use coordinator::{PurgeReport, UploadCoordinator};
pub use records::{MediaUploadRecord, MediaUploadState, PostUploadRecord, PostUploadState};
pub use table::UploadTable;
