use thiserror::Error;

/// Datastore errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The bucket does not exist.
    #[error("bucket not found: {0}")]
    NotFound(String),

    /// A bucket with this id already exists.
    #[error("bucket already exists: {0}")]
    AlreadyExists(String),

    /// The bucket id cannot be used as a directory or collection name.
    #[error("invalid bucket id: {0:?}")]
    InvalidBucketId(String),

    /// The operation's precondition does not hold (e.g. replacing the last
    /// event of an empty bucket).
    #[error("invalid precondition: {0}")]
    InvalidPrecondition(String),

    /// The document store could not be reached when the backend was opened.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("document encoding error: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn empty_bucket(id: &str) -> Self {
        Self::InvalidPrecondition(format!("bucket {id} has no events to replace"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
