//! The catalog entry written for every uploaded image.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::Entity;

/// Metadata kind under which photo records are filed.
pub const PHOTO_KIND: &str = "photos";

/// Filename and public address of one uploaded image.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Photo {
    pub name: String,
    pub url: String,
}

impl Photo {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Property bag written to the metadata store.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("name".into(), Value::String(self.name.clone()));
        props.insert("url".into(), Value::String(self.url.clone()));
        props
    }
}

impl TryFrom<&Entity> for Photo {
    type Error = serde_json::Error;

    fn try_from(entity: &Entity) -> Result<Self, Self::Error> {
        serde_json::from_value(Value::Object(entity.properties.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entity_with(props: Map<String, Value>) -> Entity {
        Entity {
            id: Uuid::new_v4(),
            kind: PHOTO_KIND.into(),
            properties: props,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_from_its_own_properties() {
        let photo = Photo::new("cat.png", "https://example.test/bucket/cat.png");
        let entity = entity_with(photo.to_properties());
        assert_eq!(Photo::try_from(&entity).unwrap(), photo);
    }

    #[test]
    fn extra_properties_are_ignored() {
        let mut props = Photo::new("a.jpg", "u").to_properties();
        props.insert("uploaded_by".into(), Value::String("someone".into()));
        assert_eq!(Photo::try_from(&entity_with(props)).unwrap().name, "a.jpg");
    }

    #[test]
    fn missing_url_does_not_decode() {
        let mut props = Map::new();
        props.insert("name".into(), Value::String("a.jpg".into()));
        assert!(Photo::try_from(&entity_with(props)).is_err());
    }
}
