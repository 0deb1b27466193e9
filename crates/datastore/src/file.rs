//! Durable backend storing each bucket as a directory of JSON files.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<bucket id>/metadata.json    written once at creation
//! <root>/<bucket id>/events-0.jsonl   append-only, one event per line
//! ```

use crate::backend::validate_bucket_id;
use crate::tail::RevLines;
use crate::{BucketMetadata, Error, Event, Result, StorageBackend};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const METADATA_FILE: &str = "metadata.json";
const EVENTS_FILE: &str = "events-0.jsonl";

/// File-based backend using append-only per-bucket logs.
///
/// Reads of the most recent events walk the log backward from its tail.
/// `replace_last` rewrites the log into a temporary file and renames it over
/// the live log, so a crash leaves either the old or the new log in place.
pub struct AppendLogBackend {
    root: PathBuf,
}

impl AppendLogBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "opened append-log backend");
        Ok(Self { root })
    }

    fn bucket_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Path of the bucket's event log, failing if the bucket does not exist.
    fn log_path(&self, id: &str) -> Result<PathBuf> {
        let dir = self.bucket_dir(id);
        if validate_bucket_id(id).is_err() || !dir.join(METADATA_FILE).is_file() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(dir.join(EVENTS_FILE))
    }

    fn read_metadata(path: &Path) -> Result<BucketMetadata> {
        let content = fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn append(&self, id: &str, events: &[Event]) -> Result<()> {
        let path = self.log_path(id)?;
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)?;
            buf.push(b'\n');
        }
        if buf.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&buf)?;
        debug!(bucket = id, count = events.len(), "appended events");
        Ok(())
    }

    fn open_log(&self, id: &str) -> Result<Option<File>> {
        let path = self.log_path(id)?;
        match File::open(&path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fill a temporary file next to `path`, sync it and rename it into place.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let file = File::create(&tmp_path)?;
    let mut writer = BufWriter::new(file);
    let written = write(&mut writer).and_then(|()| {
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

impl StorageBackend for AppendLogBackend {
    fn create_bucket(&mut self, metadata: BucketMetadata) -> Result<()> {
        validate_bucket_id(&metadata.id)?;
        let dir = self.bucket_dir(&metadata.id);
        let meta_path = dir.join(METADATA_FILE);
        if meta_path.exists() {
            return Err(Error::AlreadyExists(metadata.id));
        }

        fs::create_dir_all(&dir)?;
        write_atomic(&meta_path, |w| Ok(serde_json::to_writer_pretty(w, &metadata)?))?;
        File::create(dir.join(EVENTS_FILE))?;
        debug!(bucket = %metadata.id, "created bucket");
        Ok(())
    }

    fn delete_bucket(&mut self, id: &str) -> Result<()> {
        self.log_path(id)?;
        fs::remove_dir_all(self.bucket_dir(id))?;
        debug!(bucket = id, "deleted bucket");
        Ok(())
    }

    fn get_metadata(&self, id: &str) -> Result<BucketMetadata> {
        self.log_path(id)?;
        Self::read_metadata(&self.bucket_dir(id).join(METADATA_FILE))
    }

    fn buckets(&self) -> Result<BTreeMap<String, BucketMetadata>> {
        let mut buckets = BTreeMap::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta_path = entry.path().join(METADATA_FILE);
            if !meta_path.is_file() {
                continue;
            }
            match Self::read_metadata(&meta_path) {
                Ok(metadata) => {
                    buckets.insert(metadata.id.clone(), metadata);
                }
                Err(e) => {
                    warn!(path = %meta_path.display(), error = %e, "skipping unreadable bucket");
                }
            }
        }
        Ok(buckets)
    }

    fn insert_one(&mut self, id: &str, event: Event) -> Result<()> {
        self.append(id, std::slice::from_ref(&event))
    }

    fn insert_many(&mut self, id: &str, events: Vec<Event>) -> Result<()> {
        self.append(id, &events)
    }

    fn get_events(&self, id: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        let Some(file) = self.open_log(id)? else {
            return Ok(Vec::new());
        };

        let lines = RevLines::new(file)?;
        let limit = limit.unwrap_or(usize::MAX);
        lines
            .take(limit)
            .map(|line| {
                let (offset, bytes) = line?;
                serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Corrupt(format!("{id}/{EVENTS_FILE} at byte {offset}: {e}"))
                })
            })
            .collect()
    }

    fn replace_last(&mut self, id: &str, event: Event) -> Result<()> {
        let path = self.log_path(id)?;
        let Some(mut file) = self.open_log(id)? else {
            return Err(Error::empty_bucket(id));
        };

        let last_offset = match RevLines::new(&mut file)?.next() {
            Some(line) => line?.0,
            None => return Err(Error::empty_bucket(id)),
        };

        file.seek(SeekFrom::Start(0))?;
        let mut prefix = file.take(last_offset);
        write_atomic(&path, |w| {
            io::copy(&mut prefix, w)?;
            serde_json::to_writer(&mut *w, &event)?;
            w.write_all(b"\n")?;
            Ok(())
        })?;
        debug!(bucket = id, offset = last_offset, "replaced last event");
        Ok(())
    }
}
