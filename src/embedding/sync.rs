/// Startup synchronization of the keyword and vector indices from the catalog
use super::{EmbeddingProvider, KeywordIndex, VectorIndex};
use crate::catalog::SqliteCatalog;
use crate::error::{MemeseekError, Result};
use tracing::{info, warn};

/// Outcome of an index synchronization
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Items added to the keyword index
    pub lexical: usize,
    /// Embeddings added to the vector index
    pub vectors: usize,
    /// Items or embeddings that could not be indexed
    pub skipped: usize,
}

/// Load every catalog item into the keyword index and every usable stored
/// embedding into the vector index
pub fn sync_indices(
    catalog: &SqliteCatalog,
    keyword_index: &mut KeywordIndex,
    vector_index: &VectorIndex,
) -> Result<SyncReport> {
    let start = std::time::Instant::now();
    let mut report = SyncReport::default();

    for item in catalog.items()? {
        match keyword_index.insert(&item) {
            Ok(()) => report.lexical += 1,
            Err(e) => {
                warn!("Skipping item {} for keyword index: {}", item.id, e);
                report.skipped += 1;
            }
        }
    }

    keyword_index
        .commit()
        .map_err(|e| MemeseekError::Index(e.to_string()))?;

    for (id, embedding) in catalog.embeddings()? {
        match vector_index.insert(id, &embedding) {
            Ok(()) => report.vectors += 1,
            Err(e) => {
                warn!("Skipping embedding of item {}: {}", id, e);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Index sync complete: {} lexical, {} vectors, {} skipped, {}ms",
        report.lexical,
        report.vectors,
        report.skipped,
        start.elapsed().as_millis()
    );

    Ok(report)
}

/// Compute and store embeddings for catalog items that have a description
/// but no embedding, at most `limit` items, `batch_size` per model call.
///
/// A failed batch is logged and skipped; its items stay pending. Returns the
/// number of embeddings stored.
pub fn backfill_embeddings(
    catalog: &SqliteCatalog,
    provider: &dyn EmbeddingProvider,
    limit: usize,
    batch_size: usize,
) -> Result<usize> {
    let pending = catalog.pending_embeddings(limit)?;
    info!(
        "Embedding {} items with {}",
        pending.len(),
        provider.model_name()
    );

    let mut stored = 0;
    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, text)| text.trim().to_string()).collect();

        let embeddings = match provider.embed_batch(&texts) {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(
                    "Skipping batch starting at item {}: {}",
                    batch[0].0, e
                );
                continue;
            }
        };

        for ((id, _), embedding) in batch.iter().zip(embeddings) {
            catalog.set_embedding(*id, &embedding)?;
            stored += 1;
        }
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Item;
    use crate::embedding::{EmbeddingError, Fuzziness};
    use tempfile::TempDir;

    /// Two-dimensional embedder keyed on text length
    struct LengthEmbedder;

    impl EmbeddingProvider for LengthEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            if text.contains("fail") {
                return Err(EmbeddingError::GenerationError("refused".into()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    #[test]
    fn test_backfill_embeddings() {
        let temp = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(&temp.path().join("memes.db")).unwrap();

        catalog
            .upsert(&Item::new(1, "Doge", "1.jpg").with_description("much wow"))
            .unwrap();
        catalog
            .upsert(&Item::new(2, "Broken", "2.jpg").with_description("fail here"))
            .unwrap();
        catalog
            .upsert(&Item::new(3, "Pepe", "3.jpg").with_description("feels good"))
            .unwrap();
        catalog.upsert(&Item::new(4, "Bare", "4.jpg")).unwrap();

        let stored = backfill_embeddings(&catalog, &LengthEmbedder, 10, 1).unwrap();
        assert_eq!(stored, 2);

        let embeddings = catalog.embeddings().unwrap();
        assert_eq!(embeddings, vec![(1, vec![8.0, 1.0]), (3, vec![10.0, 1.0])]);
        assert_eq!(catalog.pending_embeddings(10).unwrap().len(), 1);
    }

    #[test]
    fn test_sync_skips_bad_embeddings() {
        let temp = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(&temp.path().join("memes.db")).unwrap();

        catalog.upsert(&Item::new(1, "Grumpy cat", "1.jpg")).unwrap();
        catalog.upsert(&Item::new(2, "Doge", "2.jpg")).unwrap();
        catalog.upsert(&Item::new(3, "Pepe", "3.jpg")).unwrap();

        catalog.set_embedding(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        // Wrong dimension for this deployment
        catalog.set_embedding(2, &[1.0, 0.0]).unwrap();

        let mut keyword_index = KeywordIndex::in_memory().unwrap();
        let vector_index = VectorIndex::new(4, 16, 200, 100);

        let report = sync_indices(&catalog, &mut keyword_index, &vector_index).unwrap();
        assert_eq!(
            report,
            SyncReport {
                lexical: 3,
                vectors: 1,
                skipped: 1
            }
        );

        assert_eq!(keyword_index.len(), 3);
        assert_eq!(vector_index.len(), 1);
        let hits = keyword_index.search("pepe", 5, Fuzziness::Exact).unwrap();
        assert_eq!(hits[0].id, 3);
    }
}
