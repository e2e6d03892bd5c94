use common::{AppConfig, MetadataFilter};
use tracing::{debug, warn};

use crate::candidate::Candidate;
use crate::encoder::QueryEncoder;
use crate::error::{Result, RetrievalError};
use crate::fusion::{FusionWeights, fuse_shortlist, merge_paths};
use crate::rerank::{RankedCandidate, rerank};
use crate::source::{CandidateSource, Store};

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalDefaults {
    pub shortlist: usize,
    pub single_query_final: usize,
    pub single_query_weights: FusionWeights,
    pub vector_k: usize,
    pub lexical_k: usize,
    pub multi_path_final: usize,
    pub multi_path_weights: FusionWeights,
    pub filtered_k: usize,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            shortlist: 5,
            single_query_final: 3,
            single_query_weights: FusionWeights::SINGLE_QUERY,
            vector_k: 5,
            lexical_k: 5,
            multi_path_final: 10,
            multi_path_weights: FusionWeights::MULTI_PATH,
            filtered_k: 3,
        }
    }
}

impl From<&AppConfig> for RetrievalDefaults {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            shortlist: cfg.single_query.shortlist,
            single_query_final: cfg.single_query.final_size,
            single_query_weights: FusionWeights {
                vector: cfg.single_query.weights.vector,
                text: cfg.single_query.weights.text,
            },
            vector_k: cfg.multi_path.vector_k,
            lexical_k: cfg.multi_path.lexical_k,
            multi_path_final: cfg.multi_path.final_size,
            multi_path_weights: FusionWeights {
                vector: cfg.multi_path.weights.vector,
                text: cfg.multi_path.weights.text,
            },
            filtered_k: cfg.filtered.k,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// Lexical scores only for the vector shortlist, fused in one pass.
    SingleQuery { shortlist: usize },
    /// Independent vector and lexical top-k, merged per document.
    MultiPath { vector_k: usize, lexical_k: usize },
    /// Nearest neighbours under metadata predicates, no lexical signal.
    FilteredVector { k: usize },
}

impl RetrievalMode {
    pub const fn default_weights(self) -> FusionWeights {
        match self {
            Self::SingleQuery { .. } => FusionWeights::SINGLE_QUERY,
            Self::MultiPath { .. } => FusionWeights::MULTI_PATH,
            Self::FilteredVector { .. } => FusionWeights::VECTOR_ONLY,
        }
    }

    const fn pool_sizes(self) -> [usize; 2] {
        match self {
            Self::SingleQuery { shortlist } => [shortlist, shortlist],
            Self::MultiPath {
                vector_k,
                lexical_k,
            } => [vector_k, lexical_k],
            Self::FilteredVector { k } => [k, k],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub query_vector: Vec<f32>,
    pub keywords: String,
    pub filter: MetadataFilter,
    pub mode: RetrievalMode,
    /// Overrides the mode's default weights.
    pub weights: Option<FusionWeights>,
    pub final_size: usize,
    /// Fail instead of running vector-only when `keywords` has no terms.
    pub require_keywords: bool,
}

impl RetrievalRequest {
    pub fn single_query(
        defaults: &RetrievalDefaults,
        query_vector: Vec<f32>,
        keywords: impl Into<String>,
    ) -> Self {
        Self {
            query_vector,
            keywords: keywords.into(),
            filter: MetadataFilter::default(),
            mode: RetrievalMode::SingleQuery {
                shortlist: defaults.shortlist,
            },
            weights: Some(defaults.single_query_weights),
            final_size: defaults.single_query_final,
            require_keywords: false,
        }
    }

    pub fn multi_path(
        defaults: &RetrievalDefaults,
        query_vector: Vec<f32>,
        keywords: impl Into<String>,
    ) -> Self {
        Self {
            query_vector,
            keywords: keywords.into(),
            filter: MetadataFilter::default(),
            mode: RetrievalMode::MultiPath {
                vector_k: defaults.vector_k,
                lexical_k: defaults.lexical_k,
            },
            weights: Some(defaults.multi_path_weights),
            final_size: defaults.multi_path_final,
            require_keywords: false,
        }
    }

    pub fn filtered(
        defaults: &RetrievalDefaults,
        query_vector: Vec<f32>,
        filter: MetadataFilter,
    ) -> Self {
        Self {
            query_vector,
            keywords: String::new(),
            filter,
            mode: RetrievalMode::FilteredVector {
                k: defaults.filtered_k,
            },
            weights: None,
            final_size: defaults.filtered_k,
            require_keywords: false,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    #[must_use]
    pub const fn with_final_size(mut self, final_size: usize) -> Self {
        self.final_size = final_size;
        self
    }

    #[must_use]
    pub const fn requiring_keywords(mut self) -> Self {
        self.require_keywords = true;
        self
    }

    pub fn effective_weights(&self) -> FusionWeights {
        self.weights.unwrap_or_else(|| self.mode.default_weights())
    }

    fn validate(&self) -> Result<()> {
        if self.final_size == 0 {
            return Err(RetrievalError::invalid("final_size must be greater than zero"));
        }
        if self.mode.pool_sizes().contains(&0) {
            return Err(RetrievalError::invalid(
                "candidate pool sizes must be greater than zero",
            ));
        }
        self.effective_weights().validate()
    }
}

/// Runs a [`RetrievalRequest`] against a [`Store`]: one session per call,
/// candidate generation per mode, then fusion and reranking.
pub struct HybridRetriever<S> {
    store: S,
}

impl<S: Store> HybridRetriever<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The session is held until the reranked list exists and is dropped on
    /// every return path, including when this future is cancelled.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<Vec<RankedCandidate>> {
        request.validate()?;
        let weights = request.effective_weights();
        let encoder = QueryEncoder::new(self.store.dimension());
        let query = encoder.encode(
            &request.query_vector,
            &request.keywords,
            request.require_keywords,
        )?;

        let session = self.store.acquire().await.inspect_err(|err| {
            warn!(error = %err, "failed acquiring store session");
        })?;

        let candidates = match request.mode {
            RetrievalMode::SingleQuery { shortlist } => {
                let scored = session
                    .shortlist_with_relevance(&query.vector, &query.lexical, shortlist, &request.filter)
                    .await
                    .inspect_err(|err| warn!(error = %err, "single-query fusion failed"))?;
                fuse_shortlist(scored)
            }
            RetrievalMode::MultiPath {
                vector_k,
                lexical_k,
            } => {
                let lexical = async {
                    if query.lexical.is_empty() {
                        Ok(Vec::new())
                    } else {
                        session
                            .lexical_rank(&query.lexical, lexical_k, &request.filter)
                            .await
                    }
                };
                let (vector_hits, lexical_hits) = tokio::try_join!(
                    session.nearest(&query.vector, vector_k, &request.filter),
                    lexical,
                )
                .inspect_err(|err| warn!(error = %err, "multi-path retrieval failed"))?;
                debug!(
                    vector = vector_hits.len(),
                    lexical = lexical_hits.len(),
                    "multi-path candidates fetched"
                );
                merge_paths(vector_hits, lexical_hits)
            }
            RetrievalMode::FilteredVector { k } => session
                .nearest(&query.vector, k, &request.filter)
                .await
                .inspect_err(|err| warn!(error = %err, "filtered vector search failed"))?
                .into_iter()
                .map(Candidate::from_vector_hit)
                .collect(),
        };

        let ranked = rerank(candidates, weights, request.final_size);
        debug!(
            mode = ?request.mode,
            terms = query.lexical.terms().len(),
            results = ranked.len(),
            "retrieval finished"
        );
        drop(session);
        Ok(ranked)
    }
}
