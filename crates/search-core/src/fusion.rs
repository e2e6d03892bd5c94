use ahash::AHashMap;
use common::DocId;

use crate::candidate::Candidate;
use crate::error::{Result, RetrievalError};
use crate::source::{LexicalHit, VectorHit};

/// Linear weights applied to the vector and text scores of a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub text: f32,
}

impl FusionWeights {
    pub const SINGLE_QUERY: Self = Self {
        vector: 0.7,
        text: 0.3,
    };
    pub const MULTI_PATH: Self = Self {
        vector: 0.6,
        text: 0.4,
    };
    pub const VECTOR_ONLY: Self = Self {
        vector: 1.0,
        text: 0.0,
    };

    pub fn new(vector: f32, text: f32) -> Result<Self> {
        let weights = Self { vector, text };
        weights.validate()?;
        Ok(weights)
    }

    /// Weights must be finite and non-negative, otherwise the fused score
    /// stops being monotonic in its inputs.
    pub fn validate(self) -> Result<()> {
        let ok = |w: f32| w.is_finite() && w >= 0.0;
        if ok(self.vector) && ok(self.text) {
            Ok(())
        } else {
            Err(RetrievalError::invalid(format!(
                "fusion weights must be finite and non-negative, got {} / {}",
                self.vector, self.text
            )))
        }
    }

    pub fn fuse(self, vector_score: f32, text_score: f32) -> f32 {
        self.vector.mul_add(vector_score, self.text * text_score)
    }
}

/// Single-query fusion: every candidate comes from the vector shortlist and
/// only picks up a text score if the lexical path scored it.
pub fn fuse_shortlist(shortlist: Vec<(VectorHit, Option<f32>)>) -> Vec<Candidate> {
    let mut seen = ahash::AHashSet::with_capacity(shortlist.len());
    shortlist
        .into_iter()
        .filter(|(hit, _)| seen.insert(hit.meta.doc_id))
        .map(|(hit, relevance)| Candidate::new(hit.meta, Some(-hit.distance), relevance))
        .collect()
}

/// Multi-path fusion: the union of both candidate sets, one entry per
/// document.
pub fn merge_paths(vector_hits: Vec<VectorHit>, lexical_hits: Vec<LexicalHit>) -> Vec<Candidate> {
    merge_candidates(
        vector_hits
            .into_iter()
            .map(Candidate::from_vector_hit)
            .chain(lexical_hits.into_iter().map(Candidate::from_lexical_hit)),
    )
}

/// Folds observations into one candidate per `doc_id` with
/// [`Candidate::merge`]. The result is ordered by `doc_id`; input order does
/// not change it.
pub fn merge_candidates(observations: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut merged: AHashMap<DocId, Candidate> = AHashMap::new();
    for candidate in observations {
        let id = candidate.doc_id();
        let entry = match merged.remove(&id) {
            Some(existing) => existing.merge(&candidate),
            None => candidate,
        };
        merged.insert(id, entry);
    }

    let mut out = merged.into_values().collect::<Vec<_>>();
    out.sort_by_key(Candidate::doc_id);
    out
}
