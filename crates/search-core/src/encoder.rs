use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use crate::error::{Result, RetrievalError};

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "if", "in",
        "into", "is", "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then",
        "there", "these", "they", "this", "to", "was", "what", "when", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Deduplicated, lowercased keyword terms in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalQuery {
    terms: Vec<String>,
}

impl LexicalQuery {
    /// Lowercases, splits on anything that is not alphanumeric and drops
    /// stop words.
    pub fn parse(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let terms = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
            .map(ToOwned::to_owned)
            .collect::<BTreeSet<_>>();
        Self {
            terms: terms.into_iter().collect(),
        }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub const fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedQuery {
    pub vector: Vec<f32>,
    pub lexical: LexicalQuery,
}

/// Checks raw query input against the collection it will run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryEncoder {
    dimension: usize,
}

impl QueryEncoder {
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn encode(
        &self,
        vector: &[f32],
        keywords: &str,
        require_keywords: bool,
    ) -> Result<EncodedQuery> {
        if vector.len() != self.dimension {
            return Err(RetrievalError::invalid(format!(
                "query vector has {} dimensions, collection expects {}",
                vector.len(),
                self.dimension
            )));
        }
        if let Some(pos) = vector.iter().position(|v| !v.is_finite()) {
            return Err(RetrievalError::invalid(format!(
                "query vector component {pos} is not finite"
            )));
        }

        let lexical = LexicalQuery::parse(keywords);
        if require_keywords && lexical.is_empty() {
            return Err(RetrievalError::invalid(format!(
                "keywords `{keywords}` contain no searchable terms"
            )));
        }

        Ok(EncodedQuery {
            vector: vector.to_vec(),
            lexical,
        })
    }
}
