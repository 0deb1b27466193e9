//! Bucket-oriented view over a storage backend.

use crate::config::{DocumentStoreConfig, StorageConfig, open_backend};
use crate::{BucketMetadata, Event, Result, StorageBackend};
use std::collections::BTreeMap;

/// Owns the configured backend for the lifetime of the process.
pub struct Datastore {
    backend: Box<dyn StorageBackend>,
}

impl Datastore {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Open the backend named by the configuration.
    pub fn open(storage: &StorageConfig, document_store: &DocumentStoreConfig) -> Result<Self> {
        Ok(Self::new(open_backend(storage, document_store)?))
    }

    pub fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<Bucket<'_>> {
        let id = metadata.id.clone();
        self.backend.create_bucket(metadata)?;
        Ok(Bucket { store: self, id })
    }

    pub fn delete_bucket(&mut self, id: &str) -> Result<()> {
        self.backend.delete_bucket(id)
    }

    pub fn buckets(&self) -> Result<BTreeMap<String, BucketMetadata>> {
        self.backend.buckets()
    }

    /// Handle to an existing bucket.
    pub fn bucket(&mut self, id: impl Into<String>) -> Result<Bucket<'_>> {
        let id = id.into();
        self.backend.get_metadata(&id)?;
        Ok(Bucket { store: self, id })
    }
}

/// A single bucket of a [`Datastore`].
pub struct Bucket<'a> {
    store: &'a mut Datastore,
    id: String,
}

impl Bucket<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> Result<BucketMetadata> {
        self.store.backend.get_metadata(&self.id)
    }

    /// Most recent events first; `None` for all of them.
    pub fn get(&self, limit: Option<usize>) -> Result<Vec<Event>> {
        self.store.backend.get_events(&self.id, limit)
    }

    pub fn last(&self) -> Result<Option<Event>> {
        Ok(self.get(Some(1))?.into_iter().next())
    }

    pub fn insert_one(&mut self, event: Event) -> Result<()> {
        self.store.backend.insert_one(&self.id, event)
    }

    pub fn insert_many(&mut self, events: Vec<Event>) -> Result<()> {
        self.store.backend.insert_many(&self.id, events)
    }

    pub fn replace_last(&mut self, event: Event) -> Result<()> {
        self.store.backend.replace_last(&self.id, event)
    }

    pub fn backend_mut(&mut self) -> &mut dyn StorageBackend {
        self.store.backend.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, MemoryBackend};
    use chrono::{TimeDelta, Utc};

    #[test]
    fn bucket_handle_operations() {
        let mut store = Datastore::new(Box::new(MemoryBackend::new()));
        let mut bucket = store
            .create_bucket(BucketMetadata::new(
                "window",
                "currentwindow",
                "watcher",
                "host",
                Utc::now(),
            ))
            .unwrap();
        assert_eq!(bucket.id(), "window");
        assert!(bucket.last().unwrap().is_none());

        let event = Event::new(Utc::now(), TimeDelta::seconds(3), Default::default());
        bucket.insert_one(event.clone()).unwrap();
        assert_eq!(bucket.last().unwrap(), Some(event));
    }

    #[test]
    fn missing_bucket_handle() {
        let mut store = Datastore::new(Box::new(MemoryBackend::new()));
        assert!(matches!(store.bucket("nope"), Err(Error::NotFound(_))));
    }
}
