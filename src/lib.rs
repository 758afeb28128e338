//! Sitesync: action dispatch and upload coordination for a content sync client.
//!
//! Sitesync is the in-process core of a client that keeps posts and media in
//! sync with a remote site:
//! - A typed action bus delivering actions and change events to handlers
//! - Action chains that run a follow-up once an action succeeds
//! - Upload coordination that holds a post back until its media are uploaded
//! - Post and media stores backed by a pluggable model store
//! - Structured logging with optional span export to a local file

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Caller (UI / business logic)                       │  ← dispatch, queries
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Action Bus (bus/)                                  │  ← Registry per category
//! │  - Actions and change events                        │  ← Chain resolution
//! │  - Handler trait                                    │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Stores        │   │ Uploads       │   │ Remote Client │
//! │ (stores/)     │   │ (uploads/)    │   │ (caller's)    │
//! │ - Posts       │   │ - Records     │   │ - Network I/O │
//! │ - Media       │   │ - Readiness   │   │ - publish()   │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Storage & Domain Layers                            │
//! │  - Model store trait and backends (storage/)        │
//! │  - Ids, entities, errors (domain/)                  │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │  ← Optional
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`bus`]: action bus, actions, change events, chains
//! - [`domain`]: ids, post and media models, errors
//! - [`storage`]: model store trait with memory and JSON backends
//! - [`stores`]: post and media handlers, remote client seam
//! - [`uploads`]: upload coordinator and automatic publishing
//! - [`observability`]: tracing setup
//!
//! # Example
//!
//! ```rust
//! use sitesync::bus::{Action, ActionBus};
//! use sitesync::domain::{LocalId, MediaModel, PostModel, Result};
//! use sitesync::stores::RemoteClient;
//! use sitesync::{initialize, Config};
//! use std::sync::Arc;
//!
//! /// Pretends every request succeeds straight away.
//! struct Instant;
//!
//! impl RemoteClient for Instant {
//!     fn execute(&self, bus: &ActionBus, action: &Action) -> Result<()> {
//!         let event = sitesync::bus::ChangeEvent::success(action.kind(), action.targets());
//!         bus.publish(event.for_action(action))
//!     }
//! }
//!
//! let config = Config { auto_publish: true, ..Default::default() };
//! let core = initialize(&config, Arc::new(Instant))?;
//!
//! let post = PostModel::new(LocalId(1), LocalId(9), "Trip");
//! let photo = MediaModel::new(LocalId(2), LocalId(9), "/photos/a.jpg", "image/jpeg").for_post(LocalId(1));
//! core.bus.dispatch(Action::update_post(post.clone()))?;
//! core.uploads.register_post(&core.bus, &post, &[photo.clone()])?;
//!
//! // The upload succeeds, the post becomes ready and is pushed automatically.
//! core.bus.dispatch(Action::upload_media(photo))?;
//! assert!(core.uploads.post_record(LocalId(1)).is_none());
//! # Ok::<(), sitesync::SyncError>(())
//! ```
//!
//! # Threading
//!
//! `dispatch` and `publish` run every handler synchronously on the calling
//! thread. Remote clients do their network work elsewhere and re-enter the bus
//! with `publish` from whichever thread finishes it.

pub mod bus;
pub mod domain;
pub mod observability;
pub mod storage;
pub mod stores;
pub mod uploads;

pub use bus::{Action, ActionBus, ActionCategory, ActionKind, ChangeEvent, Handler};
pub use domain::{ErrorInfo, ErrorKind, LocalId, Result, SyncError};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{JsonModelStore, MemoryModelStore, ModelStore};
use stores::{MediaStore, PostStore, RemoteClient};
use uploads::{AutoPublisher, UploadCoordinator};

/// Runtime configuration.
///
/// Can be built from a string map (as handed over by an embedding host) or
/// from a TOML document:
///
/// ```toml
/// trace_level = "debug"
/// trace_file = "/var/log/sitesync/spans.jsonl"
/// auto_publish = true
/// store_path = "/var/lib/sitesync/models.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tracing filter directive, e.g. `"debug"` or `"sitesync::bus=trace"`.
    ///
    /// `RUST_LOG` takes precedence. Default: `"info"`
    pub trace_level: Option<String>,

    /// File that finished spans are appended to as JSON lines. No span export
    /// when unset.
    pub trace_file: Option<PathBuf>,

    /// Push posts automatically as soon as their media are uploaded.
    pub auto_publish: bool,

    /// JSON file backing the model store. An in-memory store is used when unset.
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Parses configuration from a string map.
    ///
    /// # Parsing Rules
    ///
    /// - `trace_level`, `trace_file`, `store_path`: taken as-is, empty values ignored
    /// - `auto_publish`: `true`/`yes`/`1`/`on` (any case) enable it, anything else disables it
    ///
    /// Unknown keys are ignored.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use sitesync::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("auto_publish".to_string(), "yes".to_string());
    /// map.insert("trace_level".to_string(), "debug".to_string());
    ///
    /// let config = Config::from_map(&map);
    /// assert!(config.auto_publish);
    /// assert_eq!(config.trace_level.as_deref(), Some("debug"));
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let text = |key: &str| {
            map.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let auto_publish = text("auto_publish").is_some_and(|value| {
            matches!(value.to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "on")
        });

        Self {
            trace_level: text("trace_level").map(String::from),
            trace_file: text("trace_file").map(PathBuf::from),
            auto_publish,
            store_path: text("store_path").map(PathBuf::from),
        }
    }

    /// Parses configuration from a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] on invalid TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be read, or
    /// [`SyncError::Config`] if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = ?path, "loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// The wired-up handlers of a running core.
///
/// Dropping it does not unregister anything; the bus keeps the handlers alive.
pub struct SyncCore {
    /// The bus every handler is registered on.
    pub bus: ActionBus,

    /// Model store shared by the stores and the coordinator.
    pub models: Arc<dyn ModelStore>,

    /// Upload bookkeeping.
    pub uploads: Arc<UploadCoordinator>,

    /// Handler of the `Post` category.
    pub posts: Arc<PostStore>,

    /// Handler of the `Media` category.
    pub media: Arc<MediaStore>,

    /// Present when [`Config::auto_publish`] is set.
    pub auto_publisher: Option<Arc<AutoPublisher>>,
}

impl std::fmt::Debug for SyncCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCore")
            .field("bus", &self.bus)
            .field("uploads", &self.uploads)
            .field("auto_publish", &self.auto_publisher.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds a [`SyncCore`] from `config`, sending remote work to `remote`.
///
/// The upload coordinator is registered before the stores, so it has seen an
/// `UploadMedia` action before a remote client that answers synchronously
/// reports its outcome.
///
/// Tracing is not initialized here; call
/// [`observability::init_tracing`] first if wanted.
///
/// # Errors
///
/// Returns an error if the JSON model store at `config.store_path` cannot be
/// opened.
pub fn initialize(config: &Config, remote: Arc<dyn RemoteClient>) -> Result<SyncCore> {
    tracing::debug!(
        auto_publish = config.auto_publish,
        store_path = ?config.store_path,
        "initializing sync core"
    );

    let models: Arc<dyn ModelStore> = match &config.store_path {
        Some(path) => Arc::new(JsonModelStore::new(path.clone())?),
        None => Arc::new(MemoryModelStore::new()),
    };

    let bus = ActionBus::new();
    let uploads = UploadCoordinator::new(Arc::clone(&models)).attach(&bus);
    let posts = PostStore::new(Arc::clone(&models), Arc::clone(&remote)).attach(&bus);
    let media = MediaStore::new(Arc::clone(&models), remote).attach(&bus);
    let auto_publisher = config
        .auto_publish
        .then(|| AutoPublisher::new(Arc::clone(&models)).attach(&bus));

    Ok(SyncCore {
        bus,
        models,
        uploads,
        posts,
        media,
        auto_publisher,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_values_are_trimmed_and_empty_ones_dropped() {
        let map: BTreeMap<String, String> = [
            ("trace_level", " warn "),
            ("trace_file", ""),
            ("auto_publish", "ON"),
            ("unknown", "x"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = Config::from_map(&map);

        assert_eq!(config.trace_level.as_deref(), Some("warn"));
        assert!(config.trace_file.is_none());
        assert!(config.auto_publish);
    }

    #[test]
    fn unparseable_flag_disables_auto_publish() {
        let mut map = BTreeMap::new();
        map.insert("auto_publish".to_string(), "maybe".to_string());
        assert!(!Config::from_map(&map).auto_publish);
    }

    #[test]
    fn toml_fills_missing_keys_with_defaults() {
        let config = Config::from_toml_str("auto_publish = true\n").unwrap();
        assert_eq!(
            config,
            Config {
                auto_publish: true,
                ..Config::default()
            }
        );
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = Config::from_toml_str("scan_depth = 4\n").unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitesync.toml");
        std::fs::write(&path, "trace_level = \"debug\"\nstore_path = \"/tmp/m.json\"\n").unwrap();

        let config = Config::load(&path).unwrap();

        assert_eq!(config.trace_level.as_deref(), Some("debug"));
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/m.json")));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
