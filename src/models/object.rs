//! Represents an object (file) held by the blob store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bookkeeping for a single payload stored under `<bucket>/<key>`.
///
/// The `StoredObject` struct describes the payload; the bytes themselves
/// live on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Bucket the object was written to.
    pub bucket: String,

    /// Object key inside the bucket.
    pub key: String,

    /// Content type (MIME type) reported by the uploader.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// Whether the object may be fetched anonymously.
    pub is_public: bool,

    /// Timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}
