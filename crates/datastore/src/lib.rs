//! Bucketed storage for timestamped activity events.
//!
//! Events are appended to named buckets through one of several
//! interchangeable backends. Every backend satisfies the same
//! [`StorageBackend`] contract, so callers pick one at startup and never
//! need to know which medium holds their data.
//!
//! # Core Concepts
//!
//! ## Event
//!
//! An [`Event`] is a timestamp, a duration and a JSON object of data. Two
//! events with equal data describe the same context (the same window, the
//! same URL, ...).
//!
//! ## Bucket
//!
//! A bucket is identified by a string id and holds immutable
//! [`BucketMetadata`] plus an ordered sequence of events. Insertion order is
//! authoritative: the "last" event is the most recently inserted one, and
//! only it may be overwritten via [`StorageBackend::replace_last`].
//!
//! ## Backends
//!
//! - [`MemoryBackend`] — in-process, lost on exit. Useful for tests.
//! - [`AppendLogBackend`] — one directory per bucket with an append-only
//!   JSON-lines event log.
//! - [`DocumentStoreBackend`] — MongoDB, one pair of collections per bucket.
//!
//! [`config::open_backend`] constructs the one named by a [`BackendKind`].
//!
//! # Example
//!
//! ```no_run
//! use chrono::{TimeDelta, Utc};
//! use datastore::{AppendLogBackend, BucketMetadata, Event, StorageBackend};
//!
//! let mut backend = AppendLogBackend::open("buckets")?;
//! backend.create_bucket(BucketMetadata::new(
//!     "aw-watcher-window_myhost",
//!     "currentwindow",
//!     "aw-watcher-window",
//!     "myhost",
//!     Utc::now(),
//! ))?;
//!
//! let mut data = serde_json::Map::new();
//! data.insert("app".into(), "editor".into());
//! backend.insert_one(
//!     "aw-watcher-window_myhost",
//!     Event::new(Utc::now(), TimeDelta::seconds(5), data),
//! )?;
//!
//! for event in backend.get_events("aw-watcher-window_myhost", Some(10))? {
//!     println!("{}: {:?}", event.timestamp, event.data);
//! }
//! # Ok::<(), datastore::Error>(())
//! ```

mod backend;
pub mod config;
mod document;
mod error;
mod event;
mod file;
mod memory;
mod store;
mod tail;

pub use backend::StorageBackend;
pub use config::{BackendKind, DocumentStoreConfig, StorageConfig};
pub use document::{DocumentStoreBackend, DocumentStoreOptions};
pub use error::{Error, Result};
pub use event::{BucketMetadata, Event, EventData};
pub use file::AppendLogBackend;
pub use memory::MemoryBackend;
pub use store::{Bucket, Datastore};
