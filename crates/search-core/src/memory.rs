use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use common::{Document, MetadataFilter, corpus};

use crate::encoder::LexicalQuery;
use crate::error::{self, RetrievalError, StorePath};
use crate::lexical::TantivyLexicalIndex;
use crate::source::{CandidateSource, LexicalHit, Store, VectorHit, sort_vector_hits};

/// An in-process collection: exact L2 nearest neighbours over the stored
/// embeddings and an in-RAM tantivy index for lexical relevance.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    documents: Vec<Document>,
    lexical: TantivyLexicalIndex,
    dimension: usize,
    open_sessions: AtomicUsize,
}

impl MemoryStore {
    pub fn new(documents: Vec<Document>) -> Result<Self> {
        corpus::validate_corpus(&documents)?;
        let dimension = corpus::corpus_dimension(&documents)?
            .context("memory store needs at least one document")?;
        let lexical = TantivyLexicalIndex::from_documents(&documents)?;
        tracing::debug!(documents = documents.len(), dimension, "memory store ready");
        Ok(Self {
            inner: Arc::new(MemoryInner {
                documents,
                lexical,
                dimension,
                open_sessions: AtomicUsize::new(0),
            }),
        })
    }

    pub fn from_corpus_file(path: &Path) -> Result<Self> {
        Self::new(corpus::load_corpus(path)?)
    }

    pub fn len(&self) -> usize {
        self.inner.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.documents.is_empty()
    }

    /// Sessions handed out and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn dimension(&self) -> usize {
        self.inner.dimension
    }

    async fn acquire(&self) -> error::Result<MemorySession> {
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            inner: Arc::clone(&self.inner),
        })
    }
}

pub struct MemorySession {
    inner: Arc<MemoryInner>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CandidateSource for MemorySession {
    async fn nearest(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> error::Result<Vec<VectorHit>> {
        if vector.len() != self.inner.dimension {
            return Err(RetrievalError::invalid(format!(
                "query vector has {} dimensions, collection expects {}",
                vector.len(),
                self.inner.dimension
            )));
        }

        let mut hits = self
            .inner
            .documents
            .iter()
            .filter(|doc| filter.matches(&doc.topic, &doc.audience))
            .map(|doc| VectorHit {
                meta: doc.meta(),
                distance: l2_distance(vector, &doc.embedding),
            })
            .collect::<Vec<_>>();
        sort_vector_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn lexical_rank(
        &self,
        query: &LexicalQuery,
        k: usize,
        filter: &MetadataFilter,
    ) -> error::Result<Vec<LexicalHit>> {
        self.inner
            .lexical
            .search(query, k, filter)
            .map_err(|err| RetrievalError::store(StorePath::Lexical, format!("{err:#}")))
    }
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
