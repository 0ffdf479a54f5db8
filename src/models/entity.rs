//! Represents a schemaless record in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A record of some `kind`, carrying arbitrary JSON properties.
///
/// Entities are append-only: they are inserted once and scanned by kind.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Entity {
    /// Store-assigned key.
    pub id: Uuid,

    /// Entity type the record is filed under (e.g. `photos`).
    pub kind: String,

    /// Property bag, stored as a JSON object.
    pub properties: Map<String, Value>,

    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
}
