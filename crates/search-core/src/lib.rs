pub mod candidate;
pub mod encoder;
pub mod error;
pub mod fusion;
pub mod lexical;
pub mod memory;
pub mod rerank;
pub mod retrieval;
pub mod source;
pub mod vector;

pub use candidate::Candidate;
pub use encoder::{EncodedQuery, LexicalQuery, QueryEncoder};
pub use error::{RetrievalError, StorePath};
pub use fusion::{FusionWeights, fuse_shortlist, merge_candidates, merge_paths};
pub use memory::MemoryStore;
pub use rerank::{RankedCandidate, rerank};
pub use retrieval::{HybridRetriever, RetrievalDefaults, RetrievalMode, RetrievalRequest};
pub use source::{CandidateSource, LexicalHit, Store, VectorHit};
pub use vector::{QdrantStore, VectorSearchConfig};
