//! MongoDB-backed storage.
//!
//! Each bucket owns two collections in a shared database: `<id>.events`
//! holds one document per event and `<id>.metadata` holds a single document
//! with the fixed id `"metadata"`.

use crate::backend::validate_bucket_id;
use crate::event::duration_secs;
use crate::{BucketMetadata, Error, Event, EventData, Result, StorageBackend};
use chrono::{DateTime, Utc};
use mongodb::IndexModel;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::{ClientOptions, ServerAddress};
use mongodb::sync::{Client, Collection, Database};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info};

const METADATA_ID: &str = "metadata";
const EVENTS_SUFFIX: &str = ".events";
const METADATA_SUFFIX: &str = ".metadata";

/// Connection settings for [`DocumentStoreBackend`].
#[derive(Debug, Clone)]
pub struct DocumentStoreOptions {
    /// `host:port` of the server.
    pub host: String,
    pub database: String,
    /// Upper bound on the startup liveness check.
    pub timeout: Duration,
}

impl Default for DocumentStoreOptions {
    fn default() -> Self {
        Self {
            host: "localhost:27017".to_string(),
            database: "chronolog".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Backend storing buckets in a MongoDB database.
///
/// The connection is established and verified when the backend is opened;
/// an unreachable server is reported as [`Error::Unavailable`] and no
/// backend is produced.
pub struct DocumentStoreBackend {
    client: Client,
    db: Database,
}

impl DocumentStoreBackend {
    pub fn connect(options: &DocumentStoreOptions) -> Result<Self> {
        let address = ServerAddress::parse(&options.host)
            .map_err(|e| Error::Unavailable(format!("invalid host {:?}: {e}", options.host)))?;

        let mut client_options = ClientOptions::builder().hosts(vec![address]).build();
        client_options.server_selection_timeout = Some(options.timeout);
        client_options.connect_timeout = Some(options.timeout);
        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| Error::Unavailable(e.to_string()))?;
        let db = client.database(&options.database);

        if let Err(e) = db.run_command(doc! { "ping": 1 }).run() {
            error!(host = %options.host, error = %e, "document store did not answer ping");
            return Err(Error::Unavailable(format!(
                "no response from {} within {:?}: {e}",
                options.host, options.timeout
            )));
        }

        info!(host = %options.host, database = %options.database, "connected to document store");
        Ok(Self { client, db })
    }

    /// Close the connection pool.
    pub fn close(self) {
        debug!("closing document store connection");
        drop(self.client);
    }

    fn events(&self, id: &str) -> Collection<Document> {
        self.db.collection(&format!("{id}{EVENTS_SUFFIX}"))
    }

    fn metadata(&self, id: &str) -> Collection<Document> {
        self.db.collection(&format!("{id}{METADATA_SUFFIX}"))
    }

    fn find_metadata(&self, id: &str) -> Result<Option<BucketMetadata>> {
        if validate_bucket_id(id).is_err() {
            return Ok(None);
        }
        self.metadata(id)
            .find_one(doc! { "_id": METADATA_ID })
            .run()?
            .map(|doc| metadata_from_document(&doc))
            .transpose()
    }

    /// The events collection of an existing bucket.
    fn existing_events(&self, id: &str) -> Result<Collection<Document>> {
        match self.find_metadata(id)? {
            Some(_) => Ok(self.events(id)),
            None => Err(Error::NotFound(id.to_string())),
        }
    }
}

fn newest_first() -> Document {
    doc! { "timestamp": -1, "_id": -1 }
}

fn to_bson_datetime(ts: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(ts.timestamp_millis())
}

fn from_bson_datetime(dt: bson::DateTime) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(dt.timestamp_millis())
        .ok_or_else(|| Error::Corrupt(format!("timestamp out of range: {dt}")))
}

fn event_to_document(event: &Event) -> Result<Document> {
    let data = Bson::try_from(serde_json::Value::Object(event.data.clone()))
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(doc! {
        "timestamp": to_bson_datetime(event.timestamp),
        "duration": duration_secs::to_secs(&event.duration),
        "data": data,
    })
}

fn event_from_document(doc: &Document) -> Result<Event> {
    let corrupt =
        |e: bson::document::ValueAccessError| Error::Corrupt(format!("event document: {e}"));

    let timestamp = from_bson_datetime(*doc.get_datetime("timestamp").map_err(corrupt)?)?;
    let secs = doc.get_f64("duration").map_err(corrupt)?;
    let duration = duration_secs::from_secs(secs)
        .ok_or_else(|| Error::Corrupt(format!("invalid duration {secs}")))?;
    let data = Bson::Document(doc.get_document("data").map_err(corrupt)?.clone());
    let data: EventData = match data.into_relaxed_extjson() {
        serde_json::Value::Object(map) => map,
        other => return Err(Error::Corrupt(format!("event data is not an object: {other}"))),
    };
    Ok(Event::new(timestamp, duration, data))
}

fn metadata_to_document(metadata: &BucketMetadata) -> Document {
    doc! {
        "_id": METADATA_ID,
        "id": metadata.id.as_str(),
        "name": metadata.name.as_str(),
        "type": metadata.kind.as_str(),
        "client": metadata.client.as_str(),
        "hostname": metadata.hostname.as_str(),
        "created": to_bson_datetime(metadata.created),
    }
}

fn metadata_from_document(doc: &Document) -> Result<BucketMetadata> {
    let corrupt =
        |e: bson::document::ValueAccessError| Error::Corrupt(format!("metadata document: {e}"));
    let field = |key: &str| doc.get_str(key).map(str::to_string).map_err(corrupt);

    Ok(BucketMetadata {
        id: field("id")?,
        name: field("name")?,
        kind: field("type")?,
        client: field("client")?,
        hostname: field("hostname")?,
        created: from_bson_datetime(*doc.get_datetime("created").map_err(corrupt)?)?,
    })
}

impl StorageBackend for DocumentStoreBackend {
    fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<()> {
        validate_bucket_id(&metadata.id)?;
        if self.find_metadata(&metadata.id)?.is_some() {
            return Err(Error::AlreadyExists(metadata.id));
        }

        self.events(&metadata.id)
            .create_index(IndexModel::builder().keys(newest_first()).build())
            .run()?;
        self.metadata(&metadata.id)
            .insert_one(metadata_to_document(&metadata))
            .run()?;
        debug!(bucket = %metadata.id, "created bucket");
        Ok(())
    }

    fn delete_bucket(&mut self, id: &str) -> Result<()> {
        let events = self.existing_events(id)?;
        // Metadata first: without it the bucket is no longer listed.
        self.metadata(id).drop().run()?;
        events.drop().run()?;
        debug!(bucket = id, "deleted bucket");
        Ok(())
    }

    fn get_metadata(&self, id: &str) -> Result<BucketMetadata> {
        self.find_metadata(id)?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn buckets(&self) -> Result<BTreeMap<String, BucketMetadata>> {
        let mut buckets = BTreeMap::new();
        for name in self.db.list_collection_names().run()? {
            let Some(id) = name.strip_suffix(METADATA_SUFFIX) else {
                continue;
            };
            if let Some(metadata) = self.find_metadata(id)? {
                buckets.insert(metadata.id.clone(), metadata);
            }
        }
        Ok(buckets)
    }

    fn insert_one(&mut self, id: &str, event: Event) -> Result<()> {
        let events = self.existing_events(id)?;
        events.insert_one(event_to_document(&event)?).run()?;
        Ok(())
    }

    fn insert_many(&mut self, id: &str, events: Vec<Event>) -> Result<()> {
        let collection = self.existing_events(id)?;
        if events.is_empty() {
            return Ok(());
        }
        let docs = events
            .iter()
            .map(event_to_document)
            .collect::<Result<Vec<_>>>()?;
        collection.insert_many(docs).run()?;
        debug!(bucket = id, count = events.len(), "inserted events");
        Ok(())
    }

    fn get_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        let collection = self.existing_events(id)?;
        let mut find = collection.find(doc! {}).sort(newest_first());
        if let Some(limit) = limit {
            if limit == 0 {
                return Ok(Vec::new());
            }
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        find.run()?
            .map(|doc| event_from_document(&doc?))
            .collect()
    }

    fn replace_last(&mut self, id: &str, event: Event) -> Result<()> {
        let collection = self.existing_events(id)?;
        let last = collection
            .find_one(doc! {})
            .sort(newest_first())
            .run()?
            .ok_or_else(|| Error::empty_bucket(id))?;
        let last_id = last
            .get("_id")
            .cloned()
            .ok_or_else(|| Error::Corrupt("event document without _id".to_string()))?;

        collection
            .replace_one(doc! { "_id": last_id }, event_to_document(&event)?)
            .run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use serde_json::json;

    #[test]
    fn event_document_round_trip() {
        let mut data = EventData::new();
        data.insert("app".into(), json!("editor"));
        data.insert("title".into(), json!({"file": "main.rs", "dirty": true}));
        let event = Event::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            TimeDelta::milliseconds(2_250),
            data,
        );

        let doc = event_to_document(&event).unwrap();
        assert_eq!(doc.get_f64("duration").unwrap(), 2.25);
        assert_eq!(event_from_document(&doc).unwrap(), event);
    }

    #[test]
    fn metadata_document_uses_fixed_id() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let metadata = BucketMetadata::new("b", "window", "watcher", "host", created);
        let doc = metadata_to_document(&metadata);
        assert_eq!(doc.get_str("_id").unwrap(), METADATA_ID);
        assert_eq!(doc.get_str("type").unwrap(), "window");
        assert_eq!(metadata_from_document(&doc).unwrap(), metadata);
    }
}
