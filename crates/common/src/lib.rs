pub mod config;
pub mod corpus;

pub use config::{AppConfig, BackendKind, ConfigError};

use serde::{Deserialize, Serialize};

pub type DocId = u64;

/// A stored document, as the external collection holds it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub doc_id: DocId,
    pub title: String,
    pub body: String,
    pub topic: String,
    pub audience: String,
    pub embedding: Vec<f32>,
}

impl Document {
    pub fn meta(&self) -> DocumentMeta {
        DocumentMeta {
            doc_id: self.doc_id,
            title: self.title.clone(),
            topic: self.topic.clone(),
            audience: self.audience.clone(),
        }
    }
}

/// The columns both retrieval paths return alongside their score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMeta {
    pub doc_id: DocId,
    pub title: String,
    pub topic: String,
    pub audience: String,
}

/// Equality predicates on structured metadata. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataFilter {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

impl MetadataFilter {
    pub fn new(topic: Option<String>, audience: Option<String>) -> Self {
        Self { topic, audience }
    }

    pub const fn is_empty(&self) -> bool {
        self.topic.is_none() && self.audience.is_none()
    }

    pub fn matches(&self, topic: &str, audience: &str) -> bool {
        self.topic.as_deref().is_none_or(|t| t == topic)
            && self.audience.as_deref().is_none_or(|a| a == audience)
    }
}
