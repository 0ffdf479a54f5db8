//! src/services/blob_store.rs
//!
//! Blob store seam plus `LocalBlobStore`, which keeps payloads on local disk
//! beneath `base_path/{bucket}/{key}` and their bookkeeping (size, etag,
//! visibility) in SQLite. The layout mirrors public object URLs, so any
//! static file server rooted at `base_path` can serve them.

use crate::models::object::StoredObject;
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Object storage addressed by bucket + key.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Copy the local file at `source` into `bucket` under `key`,
    /// replacing any existing object with that key.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: Option<String>,
    ) -> BlobResult<StoredObject>;

    /// Mark an existing object as anonymously readable.
    async fn make_public(&self, bucket: &str, key: &str) -> BlobResult<()>;

    /// Public address of `key` in `bucket`. Pure function of its inputs.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Build `{base}/{bucket}/{key}`.
pub fn public_object_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

/// Keys become a single file name on disk, so they share its length limit.
const MAX_OBJECT_KEY_LEN: usize = 255;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

#[derive(Clone)]
pub struct LocalBlobStore {
    /// Shared SQLite connection pool used for object bookkeeping.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Prefix of every public object URL.
    pub public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Construct the on-disk path of an object. Parents may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(key);
        path
    }

    /// Stream `source` into a temp file next to `file_path`, fsync, and
    /// rename it into place. Returns size and hex MD5 of what was written.
    async fn write_payload(&self, source: &Path, file_path: &Path) -> BlobResult<(i64, String)> {
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobStoreError::Io(io::Error::other("object path missing parent directory"))
        })?;
        let mut stream = ReaderStream::new(File::open(source).await?);
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BlobStoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobStoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobStoreError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(&tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobStoreError::Io(err));
            }
        }

        Ok((size_bytes, format!("{:x}", digest.compute())))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// - Validates bucket and key.
    /// - Writes the payload atomically, computing size and etag.
    /// - Upserts the bookkeeping row; a repeated key overwrites and resets
    ///   visibility to private.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: Option<String>,
    ) -> BlobResult<StoredObject> {
        validate_bucket_name(bucket)?;
        ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let (size_bytes, etag) = self.write_payload(source, &file_path).await?;
        tracing::debug!(bucket, key, size_bytes, %etag, "payload written");

        let insert_result = sqlx::query_as::<_, StoredObject>(
            r#"
            INSERT INTO objects (
                id, bucket, key, content_type, size_bytes, etag, is_public, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                is_public = 0,
                last_modified = excluded.last_modified
            RETURNING id, bucket, key, content_type, size_bytes, etag, is_public, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => Ok(obj),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(BlobStoreError::Sqlx(err))
            }
        }
    }

    async fn make_public(&self, bucket: &str, key: &str) -> BlobResult<()> {
        let result = sqlx::query("UPDATE objects SET is_public = 1 WHERE bucket = ? AND key = ?")
            .bind(bucket)
            .bind(key)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BlobStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.public_base_url, bucket, key)
    }
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Keys are flat filenames here, so any separator is rejected outright.
fn ensure_key_safe(key: &str) -> BlobResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(BlobStoreError::InvalidObjectKey);
    }
    if key == "." || key == ".." {
        return Err(BlobStoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\')
    {
        return Err(BlobStoreError::InvalidObjectKey);
    }
    Ok(())
}

/// Validate bucket name format.
///
/// Enforces S3/GCS-like naming rules:
/// - 3–63 characters
/// - lowercase letters, digits, dots, hyphens, underscores only
/// - must start and end with a letter or digit
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn validate_bucket_name(name: &str) -> BlobResult<()> {
    let invalid = |reason: &str| BlobStoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.into(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-' | '_'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, hyphens, and underscores",
        ));
    }

    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
