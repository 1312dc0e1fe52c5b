//! Catalog of memes
//!
//! The catalog owns every [`Item`]; the rest of the crate only holds
//! transient copies for the duration of a turn.

mod database;

pub use database::{CatalogStats, SqliteCatalog};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Immutable catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    /// Opaque media reference (usually an image URL)
    pub media_ref: String,
    pub description: Option<String>,
    pub tags: Option<String>,
}

impl Item {
    pub fn new(id: i64, name: impl Into<String>, media_ref: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            media_ref: media_ref.into(),
            description: None,
            tags: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }
}

/// Read access to the catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Batch lookup by id. Unknown ids are simply absent from the result.
    async fn fetch(&self, ids: &[i64]) -> Result<Vec<Item>>;

    /// Single lookup by id
    async fn get(&self, id: i64) -> Result<Option<Item>>;

    /// Number of items in the catalog
    async fn count(&self) -> Result<u64>;
}
