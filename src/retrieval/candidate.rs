//! Scored retrieval candidates

use crate::embedding::{KeywordSearchResult, SearchResult};
use serde::{Deserialize, Serialize};

/// Which index produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Lexical,
    Vector,
}

/// A candidate id with its source-specific score
///
/// Metadata is whatever the source index had stored; it may be partial and
/// is reconciled against the catalog before delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: i64,

    /// Relevance score, higher is better. Only comparable within one source.
    pub score: f32,

    pub source: CandidateSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl ScoredCandidate {
    /// Create a candidate without metadata
    pub fn new(id: i64, score: f32, source: CandidateSource) -> Self {
        Self {
            id,
            score,
            source,
            name: None,
            media_ref: None,
            description: None,
            tags: None,
        }
    }

    pub fn lexical(id: i64, score: f32) -> Self {
        Self::new(id, score, CandidateSource::Lexical)
    }

    pub fn vector(id: i64, score: f32) -> Self {
        Self::new(id, score, CandidateSource::Vector)
    }
}

impl From<KeywordSearchResult> for ScoredCandidate {
    fn from(hit: KeywordSearchResult) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            source: CandidateSource::Lexical,
            name: hit.name,
            media_ref: hit.media_ref,
            description: hit.description,
            tags: hit.tags,
        }
    }
}

impl From<SearchResult> for ScoredCandidate {
    fn from(hit: SearchResult) -> Self {
        Self::vector(hit.id, hit.score)
    }
}
