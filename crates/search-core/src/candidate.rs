use common::{DocId, DocumentMeta};

use crate::fusion::FusionWeights;
use crate::source::{LexicalHit, VectorHit};

/// One retrieved document and the per-path scores observed for it.
///
/// A score that no retrieval path reported stays `None` and reads as `0.0`.
/// Keeping the two apart lets [`Candidate::merge`] take the maximum over
/// observed values only, so a vector score of `-0.3` is not replaced by the
/// lexical path's implicit `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub meta: DocumentMeta,
    vector_score: Option<f32>,
    text_score: Option<f32>,
}

impl Candidate {
    pub const fn new(meta: DocumentMeta, vector_score: Option<f32>, text_score: Option<f32>) -> Self {
        Self {
            meta,
            vector_score,
            text_score,
        }
    }

    /// Distance becomes similarity by flipping its sign.
    pub fn from_vector_hit(hit: VectorHit) -> Self {
        Self::new(hit.meta, Some(-hit.distance), None)
    }

    pub fn from_lexical_hit(hit: LexicalHit) -> Self {
        Self::new(hit.meta, None, Some(hit.relevance))
    }

    pub const fn doc_id(&self) -> DocId {
        self.meta.doc_id
    }

    pub fn vector_score(&self) -> f32 {
        self.vector_score.unwrap_or(0.0)
    }

    pub fn text_score(&self) -> f32 {
        self.text_score.unwrap_or(0.0)
    }

    pub const fn observed_vector_score(&self) -> Option<f32> {
        self.vector_score
    }

    pub const fn observed_text_score(&self) -> Option<f32> {
        self.text_score
    }

    pub fn fused_score(&self, weights: FusionWeights) -> f32 {
        weights.fuse(self.vector_score(), self.text_score())
    }

    /// Combines two observations of the same document, keeping the larger
    /// observed score per path. Commutative, associative and idempotent.
    pub fn merge(self, other: &Self) -> Self {
        debug_assert_eq!(self.meta.doc_id, other.meta.doc_id);
        Self {
            meta: self.meta,
            vector_score: max_observed(self.vector_score, other.vector_score),
            text_score: max_observed(self.text_score, other.text_score),
        }
    }
}

fn max_observed(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use common::DocumentMeta;

    use super::Candidate;
    use crate::source::{LexicalHit, VectorHit};

    fn meta(id: u64) -> DocumentMeta {
        DocumentMeta {
            doc_id: id,
            title: format!("doc {id}"),
            topic: "ops".to_string(),
            audience: "engineers".to_string(),
        }
    }

    #[test]
    fn vector_hit_negates_distance() {
        let c = Candidate::from_vector_hit(VectorHit {
            meta: meta(1),
            distance: 0.25,
        });
        assert_eq!(c.vector_score(), -0.25);
        assert_eq!(c.observed_text_score(), None);
        assert_eq!(c.text_score(), 0.0);
    }

    #[test]
    fn merge_keeps_observed_negative_vector_score() {
        let from_vector = Candidate::from_vector_hit(VectorHit {
            meta: meta(2),
            distance: 0.3,
        });
        let from_lexical = Candidate::from_lexical_hit(LexicalHit {
            meta: meta(2),
            relevance: 0.8,
        });

        let merged = from_vector.clone().merge(&from_lexical);
        assert_eq!(merged.vector_score(), -0.3);
        assert_eq!(merged.text_score(), 0.8);
        assert_eq!(merged, from_lexical.merge(&from_vector));
    }

    #[test]
    fn merge_takes_per_field_maximum() {
        let a = Candidate::new(meta(3), Some(-0.4), Some(0.1));
        let b = Candidate::new(meta(3), Some(-0.2), Some(0.05));
        let merged = a.merge(&b);
        assert_eq!(merged.observed_vector_score(), Some(-0.2));
        assert_eq!(merged.observed_text_score(), Some(0.1));
    }

    #[test]
    fn merge_with_self_is_identity() {
        let c = Candidate::new(meta(4), Some(-0.7), None);
        assert_eq!(c.clone().merge(&c), c);
    }
}
