//! In-process backend, scoped to the lifetime of the value.

use crate::backend::validate_bucket_id;
use crate::{BucketMetadata, Error, Event, Result, StorageBackend};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

struct Bucket {
    metadata: BucketMetadata,
    events: Vec<Event>,
}

/// Ephemeral backend, useful for tests and throwaway sessions.
///
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    buckets: BTreeMap<String, Bucket>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, id: &str) -> Result<&Bucket> {
        self.buckets
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn bucket_mut(&mut self, id: &str) -> Result<&mut Bucket> {
        self.buckets
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl StorageBackend for MemoryBackend {
    fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<()> {
        validate_bucket_id(&metadata.id)?;
        match self.buckets.entry(metadata.id.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(metadata.id)),
            Entry::Vacant(slot) => {
                slot.insert(Bucket {
                    metadata,
                    events: Vec::new(),
                });
                Ok(())
            }
        }
    }

    fn delete_bucket(&mut self, id: &str) -> Result<()> {
        self.buckets
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn get_metadata(&self, id: &str) -> Result<BucketMetadata> {
        Ok(self.bucket(id)?.metadata.clone())
    }

    fn buckets(&self) -> Result<BTreeMap<String, BucketMetadata>> {
        Ok(self
            .buckets
            .iter()
            .map(|(id, bucket)| (id.clone(), bucket.metadata.clone()))
            .collect())
    }

    fn insert_one(&mut self, id: &str, event: Event) -> Result<()> {
        self.bucket_mut(id)?.events.push(event);
        Ok(())
    }

    fn insert_many(&mut self, id: &str, events: Vec<Event>) -> Result<()> {
        self.bucket_mut(id)?.events.extend(events);
        Ok(())
    }

    fn get_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        let events = &self.bucket(id)?.events;
        let limit = limit.unwrap_or(events.len());
        Ok(events.iter().rev().take(limit).cloned().collect())
    }

    fn replace_last(&mut self, id: &str, event: Event) -> Result<()> {
        let last = self
            .bucket_mut(id)?
            .events
            .last_mut()
            .ok_or_else(|| Error::empty_bucket(id))?;
        *last = event;
        Ok(())
    }
}
