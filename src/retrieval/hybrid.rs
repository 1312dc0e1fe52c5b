//! Hybrid search combining lexical and vector search

use crate::config::RetrievalConfig;
use crate::embedding::{emoji, EmbeddingProvider, Fuzziness, KeywordIndex, VectorIndex};
use crate::retrieval::{
    deduplicate_candidates, exclude_ids, LexicalSearch, ScoredCandidate, VectorSearch,
};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Keyword search failed: {0}")]
    KeywordSearchError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Tuning knobs for [`HybridRetriever`]
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Lexical search requests `limit * lexical_multiplier` candidates
    pub lexical_multiplier: usize,
    /// Queries shorter than this are matched without edit tolerance
    pub fuzzy_min_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for RetrievalSettings {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            lexical_multiplier: config.lexical_multiplier.max(1),
            fuzzy_min_chars: config.fuzzy_min_chars,
        }
    }
}

/// Stateless hybrid retriever
///
/// Every call runs a fresh search; nothing is remembered between calls.
pub struct HybridRetriever {
    lexical: Arc<dyn LexicalSearch>,
    vector: Arc<dyn VectorSearch>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    settings: RetrievalSettings,
}

impl HybridRetriever {
    pub fn new(
        lexical: Arc<dyn LexicalSearch>,
        vector: Arc<dyn VectorSearch>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            lexical,
            vector,
            embedding_provider,
            settings,
        }
    }

    /// Retriever over the concrete keyword and vector indices
    pub fn from_indices(
        keyword_index: KeywordIndex,
        vector_index: VectorIndex,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        settings: RetrievalSettings,
    ) -> Self {
        Self::new(
            Arc::new(Arc::new(keyword_index)),
            Arc::new(Arc::new(vector_index)),
            embedding_provider,
            settings,
        )
    }

    /// Ranked, deduplicated candidates for `query`, at most `limit`
    ///
    /// Lexical hits come first in their own order. Vector search runs only
    /// when lexical search cannot fill `limit`, and contributes only ids the
    /// lexical hits do not already hold. Failures of either path degrade to
    /// an empty contribution from that path.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Vec<ScoredCandidate> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let lexical = match self.lexical_search(query, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Lexical search failed for {:?}: {}", query, e);
                Vec::new()
            }
        };

        if lexical.len() >= limit {
            debug!(
                "Lexical search filled {} slots for {:?}, skipping vector search",
                limit, query
            );
            let mut results = lexical;
            results.truncate(limit);
            return results;
        }

        let semantic = match self.semantic_search(query, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Vector search failed for {:?}: {}", query, e);
                Vec::new()
            }
        };

        let lexical_ids: HashSet<i64> = lexical.iter().map(|c| c.id).collect();
        let supplement = deduplicate_candidates(exclude_ids(semantic, &lexical_ids));

        debug!(
            "Hybrid search for {:?}: {} lexical + {} vector candidates",
            query,
            lexical.len(),
            supplement.len()
        );

        let mut results = lexical;
        results.extend(supplement);
        results.truncate(limit);
        results
    }

    /// Lexical search with edit tolerance chosen by query length
    async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let fuzziness = Fuzziness::for_query(query, self.settings.fuzzy_min_chars);
        let request = limit.saturating_mul(self.settings.lexical_multiplier);

        let hits = self.lexical.text_search(query, request, fuzziness).await?;
        Ok(deduplicate_candidates(hits))
    }

    /// Vector search over the embedding of the (emoji-normalized) query
    async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let text = emoji::embedding_text(query);
        if text.is_empty() {
            return Err(SearchError::InvalidQuery(format!(
                "Nothing to embed for {:?}",
                query
            )));
        }

        let embedding = self.embed(text).await?;
        self.vector.vector_search(&embedding, limit).await
    }

    /// Run the blocking embedder off the async worker threads
    async fn embed(&self, text: String) -> Result<Vec<f32>, SearchError> {
        let provider = Arc::clone(&self.embedding_provider);

        tokio::task::spawn_blocking(move || provider.embed(&text))
            .await
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::retrieval::CandidateSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeLexical {
        hits: Vec<i64>,
        fail: bool,
        requests: Mutex<Vec<(String, usize, Fuzziness)>>,
    }

    impl FakeLexical {
        fn new(hits: Vec<i64>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                fail: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                hits: Vec::new(),
                fail: true,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LexicalSearch for FakeLexical {
        async fn text_search(
            &self,
            query: &str,
            limit: usize,
            fuzziness: Fuzziness,
        ) -> Result<Vec<ScoredCandidate>, SearchError> {
            self.requests
                .lock()
                .unwrap()
                .push((query.to_string(), limit, fuzziness));
            if self.fail {
                return Err(SearchError::KeywordSearchError("index unreachable".into()));
            }
            Ok(self
                .hits
                .iter()
                .take(limit)
                .enumerate()
                .map(|(rank, id)| ScoredCandidate::lexical(*id, 10.0 - rank as f32))
                .collect())
        }
    }

    struct FakeVector {
        hits: Vec<i64>,
        calls: AtomicUsize,
        last_limit: AtomicUsize,
    }

    impl FakeVector {
        fn new(hits: Vec<i64>) -> Arc<Self> {
            Arc::new(Self {
                hits,
                calls: AtomicUsize::new(0),
                last_limit: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VectorSearch for FakeVector {
        async fn vector_search(
            &self,
            _vector: &[f32],
            limit: usize,
        ) -> Result<Vec<ScoredCandidate>, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_limit.store(limit, Ordering::SeqCst);
            Ok(self
                .hits
                .iter()
                .take(limit)
                .enumerate()
                .map(|(rank, id)| ScoredCandidate::vector(*id, 0.9 - rank as f32 * 0.01))
                .collect())
        }
    }

    struct RecordingEmbedder {
        fail: bool,
        texts: Mutex<Vec<String>>,
    }

    impl RecordingEmbedder {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                texts: Mutex::new(Vec::new()),
            })
        }
    }

    impl EmbeddingProvider for RecordingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(EmbeddingError::GenerationError("service down".into()))
            } else {
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    fn retriever(
        lexical: Arc<FakeLexical>,
        vector: Arc<FakeVector>,
        embedder: Arc<RecordingEmbedder>,
    ) -> HybridRetriever {
        HybridRetriever::new(lexical, vector, embedder, RetrievalSettings::default())
    }

    fn ids(candidates: &[ScoredCandidate]) -> Vec<i64> {
        candidates.iter().map(|c| c.id).collect()
    }

    #[tokio::test]
    async fn test_lexical_fills_limit_skips_vector() {
        let lexical = FakeLexical::new((1..=12).collect());
        let vector = FakeVector::new(vec![100, 101]);
        let embedder = RecordingEmbedder::new(false);
        let hybrid = retriever(lexical.clone(), vector.clone(), embedder.clone());

        let results = hybrid.retrieve("funny cats", 5).await;

        assert_eq!(ids(&results), vec![1, 2, 3, 4, 5]);
        assert_eq!(vector.calls.load(Ordering::SeqCst), 0);
        assert!(embedder.texts.lock().unwrap().is_empty());

        let requests = lexical.requests.lock().unwrap();
        assert_eq!(requests[0].1, 10);
        assert_eq!(requests[0].2, Fuzziness::OneEdit);
    }

    #[tokio::test]
    async fn test_merge_supplements_with_unique_vector_hits() {
        let lexical = FakeLexical::new(vec![1, 2, 3]);
        let vector = FakeVector::new(vec![3, 10, 11, 12]);
        let hybrid = retriever(lexical, vector.clone(), RecordingEmbedder::new(false));

        let results = hybrid.retrieve("cats", 100).await;

        assert_eq!(ids(&results), vec![1, 2, 3, 10, 11, 12]);
        assert!(results[..3]
            .iter()
            .all(|c| c.source == CandidateSource::Lexical));
        assert!(results[3..]
            .iter()
            .all(|c| c.source == CandidateSource::Vector));
        assert_eq!(vector.last_limit.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_merge_truncates_to_limit() {
        let lexical = FakeLexical::new(vec![1, 2]);
        let vector = FakeVector::new(vec![5, 6, 7, 8]);
        let hybrid = retriever(lexical, vector, RecordingEmbedder::new(false));

        let results = hybrid.retrieve("cats", 4).await;
        assert_eq!(ids(&results), vec![1, 2, 5, 6]);
    }

    #[tokio::test]
    async fn test_no_lexical_hits_falls_back_to_vector() {
        let lexical = FakeLexical::new(Vec::new());
        let vector = FakeVector::new(vec![301, 302, 303]);
        let hybrid = retriever(lexical, vector.clone(), RecordingEmbedder::new(false));

        let results = hybrid.retrieve("nonexistent topic", 5).await;

        assert_eq!(ids(&results), vec![301, 302, 303]);
        assert_eq!(vector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(vector.last_limit.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_empty_query_returns_nothing() {
        let lexical = FakeLexical::new(vec![1]);
        let vector = FakeVector::new(vec![2]);
        let embedder = RecordingEmbedder::new(false);
        let hybrid = retriever(lexical.clone(), vector, embedder.clone());

        assert!(hybrid.retrieve("   ", 5).await.is_empty());
        assert!(hybrid.retrieve("cats", 0).await.is_empty());
        assert!(embedder.texts.lock().unwrap().is_empty());
        assert!(lexical.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_lexical_results() {
        let lexical = FakeLexical::new(vec![1, 2]);
        let vector = FakeVector::new(vec![9]);
        let hybrid = retriever(lexical, vector.clone(), RecordingEmbedder::new(true));

        let results = hybrid.retrieve("cats", 5).await;

        assert_eq!(ids(&results), vec![1, 2]);
        assert_eq!(vector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lexical_failure_degrades_to_vector() {
        let vector = FakeVector::new(vec![4, 5]);
        let hybrid = retriever(FakeLexical::failing(), vector, RecordingEmbedder::new(false));

        let results = hybrid.retrieve("cats", 5).await;
        assert_eq!(ids(&results), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_emoji_query_is_normalized_for_embedding_only() {
        let lexical = FakeLexical::new(Vec::new());
        let embedder = RecordingEmbedder::new(false);
        let hybrid = retriever(lexical.clone(), FakeVector::new(vec![1]), embedder.clone());

        hybrid.retrieve("😂🐱", 5).await;

        assert_eq!(*embedder.texts.lock().unwrap(), vec!["laughing tears cat"]);
        assert_eq!(lexical.requests.lock().unwrap()[0].0, "😂🐱");
    }

    #[tokio::test]
    async fn test_unknown_emoji_never_reaches_embedder() {
        let embedder = RecordingEmbedder::new(false);
        let vector = FakeVector::new(vec![1]);
        let hybrid = retriever(FakeLexical::new(Vec::new()), vector.clone(), embedder.clone());

        for query in ["🦩", "🇦🇶", "🦩 🇦🇶"] {
            assert!(hybrid.retrieve(query, 5).await.is_empty(), "{:?}", query);
        }
        assert!(embedder.texts.lock().unwrap().is_empty());
        assert_eq!(vector.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_flags_and_keycaps_are_embedded_as_words() {
        let embedder = RecordingEmbedder::new(false);
        let hybrid = retriever(
            FakeLexical::new(Vec::new()),
            FakeVector::new(vec![4]),
            embedder.clone(),
        );

        hybrid.retrieve("🇷🇺", 5).await;
        hybrid.retrieve("1\u{fe0f}\u{20e3}", 5).await;
        assert_eq!(*embedder.texts.lock().unwrap(), vec!["russia", "one"]);
    }

    #[tokio::test]
    async fn test_short_query_matches_exactly() {
        let lexical = FakeLexical::new(vec![1]);
        let hybrid = retriever(
            lexical.clone(),
            FakeVector::new(Vec::new()),
            RecordingEmbedder::new(false),
        );

        hybrid.retrieve("кот", 1).await;
        assert_eq!(lexical.requests.lock().unwrap()[0].2, Fuzziness::Exact);
    }

    #[tokio::test]
    async fn test_duplicate_vector_hits_collapse() {
        let lexical = FakeLexical::new(vec![1]);
        let vector = FakeVector::new(vec![2, 2, 1, 3]);
        let hybrid = retriever(lexical, vector, RecordingEmbedder::new(false));

        let results = hybrid.retrieve("cats", 10).await;
        assert_eq!(ids(&results), vec![1, 2, 3]);
    }
}
