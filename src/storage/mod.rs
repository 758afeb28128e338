//! Storage layer for persisted posts and media.
//!
//! The sync core treats persistence as an external collaborator reached through
//! the [`ModelStore`] trait. Two backends are provided: an in-process map and
//! a JSON file.
//!
//! # Modules
//!
//! - `backend`: the [`ModelStore`] trait
//! - `memory`: [`MemoryModelStore`], unpersisted
//! - `json`: [`JsonModelStore`], JSON file with atomic writes
//! - `models`: the [`StoreData`] container both backends share

pub mod backend;
pub mod json;
pub mod memory;
pub mod models;

pub use backend::ModelStore;
pub use json::JsonModelStore;
pub use memory::MemoryModelStore;
pub use models::StoreData;
