use serde::{Deserialize, Serialize};

use super::repo::Collection;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CollectionRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<Collection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<Collection>>,
}

impl CollectionResponse {
    pub fn one(message: &str, collection: Collection) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            collection: Some(collection),
            collections: None,
        }
    }

    pub fn many(collections: Vec<Collection>) -> Self {
        Self {
            success: true,
            message: None,
            collection: None,
            collections: Some(collections),
        }
    }

    pub fn message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            collection: None,
            collections: None,
        }
    }
}
