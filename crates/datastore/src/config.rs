//! Backend selection.

use crate::document::{DocumentStoreBackend, DocumentStoreOptions};
use crate::{AppendLogBackend, MemoryBackend, Result, StorageBackend};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which backend to persist buckets with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Memory,
    #[default]
    File,
    DocumentStore,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::File => "file",
            BackendKind::DocumentStore => "document-store",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            "document-store" => Ok(BackendKind::DocumentStore),
            other => Err(format!(
                "unknown backend '{other}' (expected memory, file or document-store)"
            )),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory of the file backend. Defaults to the per-user data dir.
    pub data_dir: Option<PathBuf>,
}

/// `[document_store]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentStoreConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Seconds to wait for the server at startup.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    DocumentStoreOptions::default().host
}

fn default_database() -> String {
    DocumentStoreOptions::default().database
}

fn default_timeout_secs() -> u64 {
    DocumentStoreOptions::default().timeout.as_secs()
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            database: default_database(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl From<&DocumentStoreConfig> for DocumentStoreOptions {
    fn from(config: &DocumentStoreConfig) -> Self {
        Self {
            host: config.host.clone(),
            database: config.database.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Root directory for file-backed buckets in the per-user data directory.
///
/// Falls back to `.chronolog/buckets` in the working directory on platforms
/// without a data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("chronolog"))
        .unwrap_or_else(|| PathBuf::from(".chronolog"))
        .join("buckets")
}

/// Construct the configured backend.
pub fn open_backend(
    storage: &StorageConfig,
    document_store: &DocumentStoreConfig,
) -> Result<Box<dyn StorageBackend>> {
    let backend: Box<dyn StorageBackend> = match storage.backend {
        BackendKind::Memory => Box::new(MemoryBackend::new()),
        BackendKind::File => {
            let root = storage.data_dir.clone().unwrap_or_else(default_data_dir);
            Box::new(AppendLogBackend::open(root)?)
        }
        BackendKind::DocumentStore => {
            Box::new(DocumentStoreBackend::connect(&document_store.into())?)
        }
    };
    tracing::info!(backend = %storage.backend, "storage backend ready");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_names() {
        for kind in [BackendKind::Memory, BackendKind::File, BackendKind::DocumentStore] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn default_data_dir_ends_in_buckets() {
        assert!(default_data_dir().ends_with("buckets"));
    }

    #[test]
    fn open_memory_backend() {
        let backend = open_backend(
            &StorageConfig {
                backend: BackendKind::Memory,
                data_dir: None,
            },
            &DocumentStoreConfig::default(),
        )
        .unwrap();
        assert!(backend.buckets().unwrap().is_empty());
    }
}
