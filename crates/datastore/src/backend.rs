//! The storage contract shared by every backend.

use crate::{BucketMetadata, Error, Event, Result};
use std::collections::BTreeMap;

/// Uniform operation set implemented by each storage backend.
///
/// Events are kept in insertion order; "last" and "most recent" refer to
/// insertion order, not timestamps. The exception is
/// [`DocumentStoreBackend`](crate::DocumentStoreBackend), which has no
/// insertion order and ranks events by timestamp instead, breaking ties by
/// insertion. Implementations are not internally synchronized: the caller
/// serializes writers to a bucket.
pub trait StorageBackend: Send {
    /// Create a bucket with the given metadata and no events.
    ///
    /// Fails with [`Error::AlreadyExists`] if the id is taken.
    fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<()>;

    /// Remove a bucket's metadata and all of its events.
    fn delete_bucket(&mut self, id: &str) -> Result<()>;

    fn get_metadata(&self, id: &str) -> Result<BucketMetadata>;

    /// All live buckets, keyed by id.
    fn buckets(&self) -> Result<BTreeMap<String, BucketMetadata>>;

    fn insert_one(&mut self, id: &str, event: Event) -> Result<()>;

    /// Append events in the order given.
    fn insert_many(&mut self, id: &str, events: Vec<Event>) -> Result<()>;

    /// The `limit` most recently inserted events, newest first.
    /// `None` returns every event.
    fn get_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<Event>>;

    /// Overwrite the most recently inserted event.
    ///
    /// Fails with [`Error::InvalidPrecondition`] if the bucket is empty.
    fn replace_last(&mut self, id: &str, event: Event) -> Result<()>;

    /// Whether a bucket with this id exists.
    fn bucket_exists(&self, id: &str) -> Result<bool> {
        match self.get_metadata(id) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Reject ids that cannot safely name a directory or a collection.
pub(crate) fn validate_bucket_id(id: &str) -> Result<()> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if invalid {
        return Err(Error::InvalidBucketId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_ids() {
        assert!(validate_bucket_id("aw-watcher-window_host").is_ok());
        assert!(validate_bucket_id("bucket.with.dots").is_ok());
    }

    #[test]
    fn rejects_path_like_ids() {
        for id in ["", ".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(validate_bucket_id(id), Err(Error::InvalidBucketId(_))),
                "{id:?} should be rejected"
            );
        }
    }
}
