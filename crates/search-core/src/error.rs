use std::fmt;

use common::ConfigError;

/// Which store call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePath {
    Session,
    Vector,
    Lexical,
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Vector => "vector",
            Self::Lexical => "lexical",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("store unavailable ({path}): {message}")]
    StoreUnavailable { path: StorePath, message: String },
}

impl RetrievalError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    pub fn store(path: StorePath, err: impl fmt::Display) -> Self {
        Self::StoreUnavailable {
            path,
            message: err.to_string(),
        }
    }

    /// Store failures may succeed if the caller tries again; configuration
    /// and query errors will not.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use common::ConfigError;

    use super::{RetrievalError, StorePath};

    #[test]
    fn store_errors_name_the_failing_path() {
        let err = RetrievalError::store(StorePath::Lexical, "connection reset");
        assert_eq!(
            err.to_string(),
            "store unavailable (lexical): connection reset"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn config_and_query_errors_are_not_transient() {
        let cfg: RetrievalError = ConfigError::Missing("qdrant_url").into();
        assert!(!cfg.is_transient());
        assert!(cfg.to_string().contains("qdrant_url"));
        assert!(!RetrievalError::invalid("bad dim").is_transient());
    }
}
