//! Embedding & indexing
//!
//! - `EmbeddingProvider` trait with a local FastEmbed implementation
//! - Tantivy keyword index over meme name, description and tags
//! - HNSW vector index over stored embeddings
//! - Emoji-to-words normalization for pictographic queries
//! - Startup synchronization of both indices from the catalog
pub mod emoji;
mod keyword_index;
mod provider;
mod sync;
mod vector_index;

pub use keyword_index::{Fuzziness, KeywordIndex, KeywordIndexError, KeywordSearchResult};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use sync::{backfill_embeddings, sync_indices, SyncReport};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};
