use std::cmp::Ordering;

use common::DocumentMeta;
use serde::{Deserialize, Serialize};

use crate::candidate::Candidate;
use crate::fusion::FusionWeights;

/// A reranked result with both component scores kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCandidate {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub vector_score: f32,
    pub text_score: f32,
    pub fused_score: f32,
}

/// Sorts by fused score, highest first, with ties going to the lower
/// `doc_id`, and keeps at most `final_size` results.
pub fn rerank(
    candidates: Vec<Candidate>,
    weights: FusionWeights,
    final_size: usize,
) -> Vec<RankedCandidate> {
    let mut ranked = candidates
        .into_iter()
        .map(|c| RankedCandidate {
            fused_score: c.fused_score(weights),
            vector_score: c.vector_score(),
            text_score: c.text_score(),
            meta: c.meta,
        })
        .collect::<Vec<_>>();
    ranked.sort_by(rank_order);
    ranked.truncate(final_size);
    ranked
}

fn rank_order(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.fused_score
        .total_cmp(&a.fused_score)
        .then_with(|| a.meta.doc_id.cmp(&b.meta.doc_id))
}
