//! In-memory stand-ins for the blob and metadata stores, with switches to
//! simulate failures.

use crate::{
    models::{entity::Entity, object::StoredObject},
    services::{
        blob_store::{BlobResult, BlobStore, BlobStoreError, public_object_url},
        metadata_store::{MetadataError, MetadataResult, MetadataStore},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use std::{
    collections::{HashMap, HashSet},
    io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

type ObjectKey = (String, String);

/// `FakeBlobStore` keeps payloads in a map keyed by (bucket, key).
#[derive(Clone)]
pub struct FakeBlobStore {
    public_base_url: String,
    objects: Arc<Mutex<HashMap<ObjectKey, Bytes>>>,
    public: Arc<Mutex<HashSet<ObjectKey>>>,
    fail_objects: Arc<Mutex<HashSet<String>>>,
}

impl FakeBlobStore {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            public_base_url: public_base_url.to_string(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            public: Arc::new(Mutex::new(HashSet::new())),
            fail_objects: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make every upload of `key` fail, whatever the bucket.
    pub async fn fake_fail_object(&self, key: &str) {
        self.fail_objects.lock().await.insert(key.to_string());
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let objects = self.objects.lock().await;
        objects.get(&(bucket.to_string(), key.to_string())).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_public(&self, bucket: &str, key: &str) -> bool {
        let public = self.public.lock().await;
        public.contains(&(bucket.to_string(), key.to_string()))
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: Option<String>,
    ) -> BlobResult<StoredObject> {
        if self.fail_objects.lock().await.contains(key) {
            return Err(BlobStoreError::Io(io::Error::other(format!(
                "simulated failure writing {}",
                key
            ))));
        }

        let data = Bytes::from(tokio::fs::read(source).await?);
        let stored = StoredObject {
            id: Uuid::new_v4(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type,
            size_bytes: data.len() as i64,
            etag: format!("{:x}", md5::compute(&data)),
            is_public: false,
            last_modified: Utc::now(),
        };

        let id = (bucket.to_string(), key.to_string());
        self.public.lock().await.remove(&id);
        self.objects.lock().await.insert(id, data);
        Ok(stored)
    }

    async fn make_public(&self, bucket: &str, key: &str) -> BlobResult<()> {
        let id = (bucket.to_string(), key.to_string());
        if !self.objects.lock().await.contains_key(&id) {
            return Err(BlobStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        self.public.lock().await.insert(id);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        public_object_url(&self.public_base_url, bucket, key)
    }
}

/// `FakeMetadataStore` appends entities to a vector and scans it in
/// insertion order.
#[derive(Clone, Default)]
pub struct FakeMetadataStore {
    entities: Arc<Mutex<Vec<Entity>>>,
    fail_inserts: Arc<AtomicBool>,
    fail_queries: Arc<AtomicBool>,
}

impl FakeMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subsequent inserts return an error and store nothing.
    pub fn fake_fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    /// Subsequent queries return an error.
    pub fn fake_fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub async fn entities(&self) -> Vec<Entity> {
        self.entities.lock().await.clone()
    }
}

fn simulated(op: &str) -> MetadataError {
    MetadataError::Sqlx(sqlx::Error::Protocol(format!("simulated {} failure", op)))
}

#[async_trait]
impl MetadataStore for FakeMetadataStore {
    async fn insert(&self, kind: &str, properties: Map<String, Value>) -> MetadataResult<Entity> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(simulated("insert"));
        }
        let entity = Entity {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            properties,
            created_at: Utc::now(),
        };
        self.entities.lock().await.push(entity.clone());
        Ok(entity)
    }

    async fn query(&self, kind: &str) -> MetadataResult<Vec<Entity>> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(simulated("query"));
        }
        let entities = self.entities.lock().await;
        Ok(entities.iter().filter(|e| e.kind == kind).cloned().collect())
    }
}
