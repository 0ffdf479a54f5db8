//! GalleryService: the upload and listing flows, written against the
//! `BlobStore` and `MetadataStore` seams.
//!
//! Blob writes and metadata writes are not transactional. A failed metadata
//! write after a successful blob write leaves an uncatalogued object behind;
//! that outcome is logged and accepted.

use crate::{
    models::photo::{PHOTO_KIND, Photo},
    services::{
        blob_store::{BlobStore, BlobStoreError},
        filename::{self, InvalidUpload},
        metadata_store::MetadataStore,
    },
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("staging upload locally: {0}")]
    Staging(#[source] io::Error),
    #[error("writing to blob store: {0}")]
    Blob(#[from] BlobStoreError),
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Settings the upload and listing flows need besides the two stores.
#[derive(Debug, Clone)]
pub struct GallerySettings {
    pub bucket: String,
    pub staging_dir: PathBuf,
    /// Lowercase extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
}

#[derive(Clone)]
pub struct GalleryService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    settings: Arc<GallerySettings>,
}

impl GalleryService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        settings: GallerySettings,
    ) -> Self {
        Self {
            blobs,
            metadata,
            settings: Arc::new(settings),
        }
    }

    /// Sanitized object name for an uploaded file, or why it was refused.
    pub fn accept_filename(&self, raw: Option<&str>) -> Result<String, InvalidUpload> {
        filename::accept_filename(raw, &self.settings.allowed_extensions)
    }

    /// Public URL of `name` in the configured bucket.
    pub fn public_url(&self, name: &str) -> String {
        self.blobs.public_url(&self.settings.bucket, name)
    }

    /// Write an incoming body to a fresh file in the staging directory.
    ///
    /// Staging files are named by a fresh UUID alone, so concurrent uploads
    /// of the same name never share a path and the client's name never
    /// reaches the local filesystem. A partial file is removed on error.
    pub async fn stage<S>(&self, name: &str, stream: S) -> UploadResult<PathBuf>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        fs::create_dir_all(&self.settings.staging_dir)
            .await
            .map_err(UploadError::Staging)?;

        let path = self
            .settings
            .staging_dir
            .join(format!(".upload-{}", Uuid::new_v4()));
        let mut file = File::create(&path).await.map_err(UploadError::Staging)?;

        let mut staged_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let written = match chunk_res {
                Ok(chunk) => {
                    staged_bytes += chunk.len() as u64;
                    file.write_all(&chunk).await
                }
                Err(err) => Err(err),
            };
            if let Err(err) = written {
                let _ = fs::remove_file(&path).await;
                return Err(UploadError::Staging(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&path).await;
            return Err(UploadError::Staging(err));
        }

        debug!(name, path = %path.display(), staged_bytes, "upload staged");
        Ok(path)
    }

    /// Push a staged file to the blob store, publish it, and catalog it.
    ///
    /// - Blob store failures abort before any metadata is written; the
    ///   staged file is left where it is.
    /// - A metadata failure is logged and the photo is still returned.
    /// - The staged file is removed once everything else has run.
    pub async fn store_staged(
        &self,
        name: &str,
        staged: &Path,
        content_type: Option<String>,
    ) -> UploadResult<Photo> {
        let bucket = &self.settings.bucket;

        let object = self
            .blobs
            .upload_file(bucket, name, staged, content_type)
            .await?;
        self.blobs.make_public(bucket, name).await?;
        debug!(
            bucket = %bucket,
            key = %object.key,
            size_bytes = object.size_bytes,
            etag = %object.etag,
            "object stored and published"
        );

        let photo = Photo::new(name, self.public_url(name));
        if let Err(err) = self
            .metadata
            .insert(PHOTO_KIND, photo.to_properties())
            .await
        {
            warn!(
                name = %photo.name,
                error = %err,
                "photo stored but its metadata record could not be written"
            );
        }

        if let Err(err) = fs::remove_file(staged).await {
            warn!(path = %staged.display(), error = %err, "could not remove staged upload");
        }

        info!(name = %photo.name, url = %photo.url, "photo uploaded");
        Ok(photo)
    }

    /// Every catalogued photo in store order. Query failures and records
    /// that do not decode are logged and left out.
    pub async fn list_photos(&self) -> Vec<Photo> {
        let entities = match self.metadata.query(PHOTO_KIND).await {
            Ok(entities) => entities,
            Err(err) => {
                warn!(error = %err, "photo listing unavailable, rendering an empty gallery");
                return Vec::new();
            }
        };

        entities
            .iter()
            .filter_map(|entity| match Photo::try_from(entity) {
                Ok(photo) => Some(photo),
                Err(err) => {
                    warn!(id = %entity.id, error = %err, "skipping malformed photo record");
                    None
                }
            })
            .collect()
    }
}
