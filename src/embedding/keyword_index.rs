/// Tantivy keyword index over meme metadata
use crate::catalog::Item;
use std::collections::HashSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::*;
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError, Term};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),
}

/// Edit-distance tolerance for lexical matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    /// Terms must match exactly
    Exact,
    /// Terms may differ by one edit (transpositions count as one)
    OneEdit,
}

impl Fuzziness {
    /// Short queries match exactly, longer ones tolerate one edit
    pub fn for_query(query: &str, min_fuzzy_chars: usize) -> Self {
        if query.trim().chars().count() < min_fuzzy_chars {
            Fuzziness::Exact
        } else {
            Fuzziness::OneEdit
        }
    }

    fn distance(self) -> u8 {
        match self {
            Fuzziness::Exact => 0,
            Fuzziness::OneEdit => 1,
        }
    }
}

/// Search hit with the stored metadata of the meme
#[derive(Debug, Clone)]
pub struct KeywordSearchResult {
    pub id: i64,
    /// BM25 (or fuzzy match) relevance score
    pub score: f32,
    pub name: Option<String>,
    pub media_ref: Option<String>,
    pub description: Option<String>,
    pub tags: Option<String>,
}

/// Tantivy keyword index wrapper
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: IndexWriter,
    id_field: Field,
    name_field: Field,
    description_field: Field,
    tags_field: Field,
    media_ref_field: Field,
}

impl KeywordIndex {
    /// Create an index held entirely in memory
    pub fn in_memory() -> Result<Self, KeywordIndexError> {
        Self::from_index(Index::create_in_ram(Self::schema()))
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field("id", INDEXED | STORED);
        schema_builder.add_text_field("name", TEXT | STORED);
        schema_builder.add_text_field("description", TEXT | STORED);
        schema_builder.add_text_field("tags", TEXT | STORED);
        schema_builder.add_text_field("media_ref", STORED);
        schema_builder.build()
    }

    fn from_index(index: Index) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();
        let field = |name: &str| {
            schema.get_field(name).map_err(|_| {
                KeywordIndexError::InitializationError(format!(
                    "Missing '{}' field in schema",
                    name
                ))
            })
        };

        let id_field = field("id")?;
        let name_field = field("name")?;
        let description_field = field("description")?;
        let tags_field = field("tags")?;
        let media_ref_field = field("media_ref")?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            name_field,
            description_field,
            tags_field,
            media_ref_field,
        })
    }

    /// Add a meme, replacing any earlier document with the same id.
    /// Visible to searches after [`commit`](Self::commit).
    pub fn insert(&mut self, item: &Item) -> Result<(), KeywordIndexError> {
        let id = u64::try_from(item.id).map_err(|_| {
            KeywordIndexError::InsertError(format!("Negative id {} cannot be indexed", item.id))
        })?;

        let mut document = doc!(
            self.id_field => id,
            self.name_field => item.name.as_str(),
            self.media_ref_field => item.media_ref.as_str(),
        );
        if let Some(description) = &item.description {
            document.add_text(self.description_field, description);
        }
        if let Some(tags) = &item.tags {
            document.add_text(self.tags_field, tags);
        }

        self.delete(item.id);
        self.writer
            .add_document(document)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// Remove a meme by id
    pub fn delete(&mut self, id: i64) {
        if let Ok(id) = u64::try_from(id) {
            self.writer
                .delete_term(Term::from_field_u64(self.id_field, id));
        }
    }

    /// Commit all pending changes and refresh the reader
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        Ok(())
    }

    /// Search name, description and tags for any of the query terms
    ///
    /// # Returns
    /// At most `limit` hits sorted by relevance, descending
    pub fn search(
        &self,
        query: &str,
        limit: usize,
        fuzziness: Fuzziness,
    ) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let tokens = self.tokenize(query)?;
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for token in &tokens {
            for field in [self.name_field, self.description_field, self.tags_field] {
                let term = Term::from_field_text(field, token);
                let clause: Box<dyn Query> = match fuzziness {
                    Fuzziness::Exact => Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
                    Fuzziness::OneEdit => {
                        Box::new(FuzzyTermQuery::new(term, fuzziness.distance(), true))
                    }
                };
                clauses.push((Occur::Should, clause));
            }
        }
        let query = BooleanQuery::new(clauses);

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ID field".to_string())
                })?;

            let text = |field: Field| {
                retrieved_doc
                    .get_first(field)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };

            results.push(KeywordSearchResult {
                id: id as i64,
                score,
                name: text(self.name_field),
                media_ref: text(self.media_ref_field),
                description: text(self.description_field),
                tags: text(self.tags_field),
            });
        }

        Ok(results)
    }

    /// Split a query with the same analyzer the text fields were indexed with
    fn tokenize(&self, query: &str) -> Result<Vec<String>, KeywordIndexError> {
        let mut analyzer = self.index.tokenizer_for_field(self.name_field)?;
        let mut stream = analyzer.token_stream(query);

        let mut seen = HashSet::new();
        let mut tokens = Vec::new();
        while stream.advance() {
            let text = stream.token().text.clone();
            if seen.insert(text.clone()) {
                tokens.push(text);
            }
        }

        Ok(tokens)
    }

    /// Get the number of documents in the index
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
