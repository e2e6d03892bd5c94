//! The two read capabilities the retriever needs from a document store.
//!
//! A [`Store`] hands out one [`Store::Session`] per query; the session is the
//! store's connection for that query and is released when it is dropped.

use std::future::Future;

use ahash::AHashMap;
use common::{DocId, DocumentMeta, MetadataFilter};

use crate::encoder::LexicalQuery;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub meta: DocumentMeta,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub meta: DocumentMeta,
    pub relevance: f32,
}

pub trait Store: Send + Sync {
    type Session: CandidateSource;

    /// Embedding length of the collection.
    fn dimension(&self) -> usize;

    fn acquire(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}

pub trait CandidateSource: Send + Sync {
    /// Up to `k` documents matching `filter`, nearest first. Equal distances
    /// are ordered by ascending `doc_id`.
    fn nearest(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> impl Future<Output = Result<Vec<VectorHit>>> + Send;

    /// Up to `k` documents matching `filter` with non-zero relevance, most
    /// relevant first. Equal relevance is ordered by ascending `doc_id`.
    /// `k` is clamped to the collection size.
    fn lexical_rank(
        &self,
        query: &LexicalQuery,
        k: usize,
        filter: &MetadataFilter,
    ) -> impl Future<Output = Result<Vec<LexicalHit>>> + Send;

    /// The vector shortlist, each entry paired with its lexical relevance if
    /// it has any. Stores that can answer this in one round trip should
    /// override it.
    fn shortlist_with_relevance(
        &self,
        vector: &[f32],
        query: &LexicalQuery,
        shortlist_k: usize,
        filter: &MetadataFilter,
    ) -> impl Future<Output = Result<Vec<(VectorHit, Option<f32>)>>> + Send {
        async move {
            let shortlist = self.nearest(vector, shortlist_k, filter).await?;
            if shortlist.is_empty() || query.is_empty() {
                return Ok(shortlist.into_iter().map(|hit| (hit, None)).collect());
            }

            let relevance = self
                .lexical_rank(query, usize::MAX, filter)
                .await?
                .into_iter()
                .map(|hit| (hit.meta.doc_id, hit.relevance))
                .collect::<AHashMap<DocId, f32>>();

            Ok(shortlist
                .into_iter()
                .map(|hit| {
                    let score = relevance.get(&hit.meta.doc_id).copied();
                    (hit, score)
                })
                .collect())
        }
    }
}

pub(crate) fn sort_vector_hits(hits: &mut [VectorHit]) {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.meta.doc_id.cmp(&b.meta.doc_id))
    });
}

pub(crate) fn sort_lexical_hits(hits: &mut [LexicalHit]) {
    hits.sort_by(|a, b| {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| a.meta.doc_id.cmp(&b.meta.doc_id))
    });
}
