//! Settings synchronization and DOI history engine with a SQLite mirror.
//!
//! Two flat storage areas, device-local and cross-device sync, hold a
//! closed option schema. A single reconciling session reacts to committed
//! changes: it sanitizes them, mirrors sync-eligible values into the
//! opposite area while sync is on, maintains a bounded DOI history log,
//! and broadcasts fire-and-forget update messages to whoever listens.
//!
//! # Examples
//!
//! In-memory usage with [`storage::SettingsStore`]:
//! ```
//! use doisync::{
//!     options::patch::OptionsPatch,
//!     storage::SettingsStore,
//!     types::StorageArea,
//! };
//!
//! let mut store = SettingsStore::new();
//! let patch = OptionsPatch {
//!     qr_size: Some(450),
//!     ..Default::default()
//! };
//! assert!(store.set(StorageArea::Local, &patch));
//! assert_eq!(store.options().qr_size, 450);
//! ```
//!
//! Runtime usage with the SQLite sink:
//! ```no_run
//! use doisync::{
//!     persist::sqlite::SqliteAreaSink,
//!     runtime::handle::{Collaborators, RuntimeConfig, spawn_session},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sink = SqliteAreaSink::open("doisync.db").expect("open sqlite");
//! let store = sink.load_store().expect("load");
//! let handle = spawn_session(
//!     store,
//!     Some(Box::new(sink)),
//!     Collaborators::default(),
//!     RuntimeConfig::default(),
//! );
//! let _ = handle.record_doi("10.1000/xyz123", None).await.expect("record");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// DOI syntax matching and normalization.
pub mod doi;
/// Feature toggles and the collaborator seams they call.
pub mod features;
/// Bounded history log over the settings store.
pub mod history;
/// Broadcast message payloads.
pub mod message;
/// Option schema, names, defaults, and patches.
pub mod options;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// The change reconciler.
pub mod reconcile;
/// Single-writer session runtime and handle.
pub mod runtime;
/// Authoritative in-memory image of both storage areas.
pub mod storage;
/// Shared primitive types.
pub mod types;
