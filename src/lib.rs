//! Memeseek - conversational meme search
//!
//! A user names a topic and a count; memeseek answers with memes they have
//! not seen yet for that topic. Candidates come from a hybrid retriever
//! (tantivy keyword search first, HNSW vector search to fill the gaps) and a
//! per-conversation state machine decides what to send next.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod embedding;
pub mod error;
pub mod retrieval;
pub mod session;

pub use error::{MemeseekError, Result};
