//! Schemaless record store seam plus `SqliteMetadataStore`, which files JSON
//! property bags by namespace and kind. Used append-and-scan only.

use crate::models::entity::Entity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("could not encode properties: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Append a new record of `kind`.
    async fn insert(&self, kind: &str, properties: Map<String, Value>) -> MetadataResult<Entity>;

    /// Every record of `kind`, in whatever order the store yields them.
    async fn query(&self, kind: &str) -> MetadataResult<Vec<Entity>>;
}

#[derive(FromRow)]
struct EntityRow {
    id: Uuid,
    kind: String,
    properties: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
    namespace: String,
}

impl SqliteMetadataStore {
    /// Records written and read through this handle are scoped to `namespace`.
    pub fn new(db: Arc<SqlitePool>, namespace: impl Into<String>) -> Self {
        Self {
            db,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(&self, kind: &str, properties: Map<String, Value>) -> MetadataResult<Entity> {
        let entity = Entity {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            properties,
            created_at: Utc::now(),
        };
        let encoded = serde_json::to_string(&entity.properties)?;

        sqlx::query(
            "INSERT INTO entities (id, namespace, kind, properties, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entity.id)
        .bind(&self.namespace)
        .bind(&entity.kind)
        .bind(encoded)
        .bind(entity.created_at)
        .execute(&*self.db)
        .await?;

        Ok(entity)
    }

    async fn query(&self, kind: &str) -> MetadataResult<Vec<Entity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT id, kind, properties, created_at
             FROM entities WHERE namespace = ? AND kind = ?",
        )
        .bind(&self.namespace)
        .bind(kind)
        .fetch_all(&*self.db)
        .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<Map<String, Value>>(&row.properties) {
                Ok(properties) => entities.push(Entity {
                    id: row.id,
                    kind: row.kind,
                    properties,
                    created_at: row.created_at,
                }),
                Err(err) => {
                    tracing::warn!(id = %row.id, kind, error = %err, "skipping undecodable entity");
                }
            }
        }

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[tokio::test]
    async fn inserted_records_come_back_by_kind() {
        let store = SqliteMetadataStore::new(Arc::new(test_pool().await), "proj");

        let written = store
            .insert("photos", props(json!({"name": "cat.png", "url": "u1"})))
            .await
            .unwrap();
        store
            .insert("audit", props(json!({"event": "upload"})))
            .await
            .unwrap();

        let photos = store.query("photos").await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, written.id);
        assert_eq!(photos[0].properties["name"], "cat.png");
    }

    #[tokio::test]
    async fn duplicate_records_are_kept() {
        let store = SqliteMetadataStore::new(Arc::new(test_pool().await), "proj");
        for _ in 0..2 {
            store
                .insert("photos", props(json!({"name": "cat.png", "url": "u"})))
                .await
                .unwrap();
        }
        assert_eq!(store.query("photos").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn namespaces_do_not_leak() {
        let pool = Arc::new(test_pool().await);
        let ours = SqliteMetadataStore::new(pool.clone(), "ours");
        let theirs = SqliteMetadataStore::new(pool, "theirs");

        theirs
            .insert("photos", props(json!({"name": "x.png", "url": "u"})))
            .await
            .unwrap();

        assert!(ours.query("photos").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped() {
        let pool = Arc::new(test_pool().await);
        let store = SqliteMetadataStore::new(pool.clone(), "proj");
        store
            .insert("photos", props(json!({"name": "ok.png", "url": "u"})))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO entities (id, namespace, kind, properties, created_at)
             VALUES (?, 'proj', 'photos', 'not json', ?)",
        )
        .bind(Uuid::new_v4())
        .bind(Utc::now())
        .execute(&*pool)
        .await
        .unwrap();

        let photos = store.query("photos").await.unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].properties["name"], "ok.png");
    }

    #[tokio::test]
    async fn query_fails_when_schema_is_missing() {
        let pool = crate::db::connect("sqlite::memory:", 1).await.unwrap();
        let store = SqliteMetadataStore::new(Arc::new(pool), "proj");
        assert!(matches!(
            store.query("photos").await,
            Err(MetadataError::Sqlx(_))
        ));
    }
}
