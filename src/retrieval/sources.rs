//! Search sources consumed by the hybrid retriever

use crate::embedding::{Fuzziness, KeywordIndex, VectorIndex};
use crate::retrieval::{ScoredCandidate, SearchError};
use async_trait::async_trait;
use std::sync::Arc;

/// Full-text search over meme metadata
#[async_trait]
pub trait LexicalSearch: Send + Sync {
    /// Ranked hits, best first, at most `limit`
    async fn text_search(
        &self,
        query: &str,
        limit: usize,
        fuzziness: Fuzziness,
    ) -> Result<Vec<ScoredCandidate>, SearchError>;
}

/// Nearest-neighbor search over meme embeddings
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Ranked neighbors, most similar first, at most `limit`
    async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError>;
}

/// Run blocking index work off the async workers
async fn run_blocking<T, F>(op: F) -> Result<T, String>
where
    F: FnOnce() -> Result<T, String> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| format!("Search task failed: {}", e))?
}

// The indices are shared behind an `Arc` so a clone can move onto the
// blocking pool for the duration of one search.

#[async_trait]
impl LexicalSearch for Arc<KeywordIndex> {
    async fn text_search(
        &self,
        query: &str,
        limit: usize,
        fuzziness: Fuzziness,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let index = Arc::clone(self);
        let query = query.to_string();

        let hits = run_blocking(move || {
            index
                .search(&query, limit, fuzziness)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(SearchError::KeywordSearchError)?;

        Ok(hits.into_iter().map(ScoredCandidate::from).collect())
    }
}

#[async_trait]
impl VectorSearch for Arc<VectorIndex> {
    async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let index = Arc::clone(self);
        let vector = vector.to_vec();

        let hits = run_blocking(move || {
            index
                .search_default(&vector, limit)
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(SearchError::VectorSearchError)?;

        Ok(hits.into_iter().map(ScoredCandidate::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use crate::retrieval::CandidateSource;

    #[tokio::test]
    async fn test_keyword_index_as_lexical_source() {
        let mut index = KeywordIndex::in_memory().unwrap();
        index
            .insert(&Item::new(5, "Cat vibing", "5.gif").with_tags("cat dance"))
            .unwrap();
        index.commit().unwrap();
        let index = Arc::new(index);

        let hits = index.text_search("cat", 10, Fuzziness::Exact).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 5);
        assert_eq!(hits[0].source, CandidateSource::Lexical);
        assert_eq!(hits[0].media_ref.as_deref(), Some("5.gif"));
    }

    #[tokio::test]
    async fn test_vector_index_as_vector_source() {
        let index = VectorIndex::new(3, 16, 100, 10).with_ef_search(32);
        index.insert(8, &[0.0, 1.0, 0.0]).unwrap();
        let index = Arc::new(index);

        let hits = index.vector_search(&[0.0, 1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 8);
        assert_eq!(hits[0].source, CandidateSource::Vector);

        let err = index.vector_search(&[1.0], 5).await;
        assert!(matches!(err, Err(SearchError::VectorSearchError(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_concurrent_searches_on_a_single_worker() {
        let mut keyword = KeywordIndex::in_memory().unwrap();
        for id in 0..200 {
            keyword
                .insert(&Item::new(id, format!("Cat number {}", id), "x.jpg").with_tags("cat"))
                .unwrap();
        }
        keyword.commit().unwrap();
        let keyword = Arc::new(keyword);

        let vector = Arc::new(VectorIndex::new(3, 16, 100, 10).with_ef_search(32));
        vector.insert(1, &[1.0, 0.0, 0.0]).unwrap();

        let ticker = tokio::spawn(async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        });

        let lexical: Arc<dyn LexicalSearch> = Arc::new(keyword);
        let vectors: Arc<dyn VectorSearch> = Arc::new(vector);
        let (text_hits, vector_hits) = tokio::join!(
            lexical.text_search("cat", 300, Fuzziness::Exact),
            vectors.vector_search(&[1.0, 0.0, 0.0], 5),
        );

        assert_eq!(text_hits.unwrap().len(), 200);
        assert_eq!(vector_hits.unwrap()[0].id, 1);
        ticker.await.unwrap();
    }
}
