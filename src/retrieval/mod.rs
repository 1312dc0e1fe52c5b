//! Hybrid retrieval
//!
//! Lexical search first, supplemented by vector nearest-neighbor search only
//! when the lexical hits cannot fill the requested size. Scores from the two
//! sources are never renormalized against each other: every lexical hit
//! ranks ahead of every vector hit.

mod candidate;
mod deduplication;
mod hybrid;
mod sources;

pub use candidate::{CandidateSource, ScoredCandidate};
pub use deduplication::{deduplicate_candidates, exclude_ids};
pub use hybrid::{HybridRetriever, RetrievalSettings, SearchError};
pub use sources::{LexicalSearch, VectorSearch};
