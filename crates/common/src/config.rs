use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Qdrant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeightsConfig {
    pub vector: f32,
    pub text: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SingleQueryConfig {
    pub shortlist: usize,
    pub final_size: usize,
    pub weights: WeightsConfig,
}

impl Default for SingleQueryConfig {
    fn default() -> Self {
        Self {
            shortlist: 5,
            final_size: 3,
            weights: WeightsConfig {
                vector: 0.7,
                text: 0.3,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MultiPathConfig {
    pub vector_k: usize,
    pub lexical_k: usize,
    pub final_size: usize,
    pub weights: WeightsConfig,
}

impl Default for MultiPathConfig {
    fn default() -> Self {
        Self {
            vector_k: 5,
            lexical_k: 5,
            final_size: 10,
            weights: WeightsConfig {
                vector: 0.6,
                text: 0.4,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilteredConfig {
    pub k: usize,
}

impl Default for FilteredConfig {
    fn default() -> Self {
        Self { k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendKind,
    pub corpus_path: Option<String>,
    pub qdrant_url: Option<String>,
    pub collection: String,
    pub lexical_index_dir: Option<String>,
    pub vector_dim: usize,
    pub log_json: bool,
    pub single_query: SingleQueryConfig,
    pub multi_path: MultiPathConfig,
    pub filtered: FilteredConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            corpus_path: None,
            qdrant_url: None,
            collection: "rag_documents".to_string(),
            lexical_index_dir: None,
            vector_dim: 8,
            log_json: false,
            single_query: SingleQueryConfig::default(),
            multi_path: MultiPathConfig::default(),
            filtered: FilteredConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Reads `path` (defaults when it does not exist), then applies
    /// `HYBRID_*` overrides from `env`.
    pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            Self::default()
        };

        if let Some(backend) = env("HYBRID_BACKEND") {
            cfg.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => BackendKind::Memory,
                "qdrant" => BackendKind::Qdrant,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "HYBRID_BACKEND",
                        reason: format!("unknown backend `{other}`"),
                    }
                    .into());
                }
            };
        }
        if let Some(corpus) = non_empty(env("HYBRID_CORPUS_PATH")) {
            cfg.corpus_path = Some(corpus);
        }
        if let Some(url) = non_empty(env("HYBRID_QDRANT_URL")) {
            cfg.qdrant_url = Some(url);
        }
        if let Some(collection) = non_empty(env("HYBRID_COLLECTION")) {
            cfg.collection = collection;
        }
        if let Some(dir) = non_empty(env("HYBRID_LEXICAL_INDEX_DIR")) {
            cfg.lexical_index_dir = Some(dir);
        }
        if let Some(dim) = env("HYBRID_VECTOR_DIM") {
            cfg.vector_dim = dim.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "HYBRID_VECTOR_DIM",
                reason: format!("`{dim}` is not a positive integer"),
            })?;
        }
        if let Some(flag) = env("HYBRID_LOG_JSON") {
            cfg.log_json = flag.eq_ignore_ascii_case("true") || flag == "1";
        }

        Ok(cfg)
    }

    /// Checks that the selected backend has what it needs to connect.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            BackendKind::Memory => {
                if self.corpus_path.is_none() {
                    return Err(ConfigError::Missing("corpus_path"));
                }
            }
            BackendKind::Qdrant => {
                if self.qdrant_url.is_none() {
                    return Err(ConfigError::Missing("qdrant_url"));
                }
                if self.lexical_index_dir.is_none() {
                    return Err(ConfigError::Missing("lexical_index_dir"));
                }
                if self.collection.trim().is_empty() {
                    return Err(ConfigError::Missing("collection"));
                }
                if self.vector_dim == 0 {
                    return Err(invalid("vector_dim", "must be greater than zero"));
                }
            }
        }

        if self.single_query.shortlist == 0 || self.single_query.final_size == 0 {
            return Err(invalid("single_query", "sizes must be greater than zero"));
        }
        if self.single_query.final_size > self.single_query.shortlist {
            return Err(invalid(
                "single_query.final_size",
                "must not exceed single_query.shortlist",
            ));
        }
        if self.multi_path.vector_k == 0
            || self.multi_path.lexical_k == 0
            || self.multi_path.final_size == 0
        {
            return Err(invalid("multi_path", "sizes must be greater than zero"));
        }
        if self.filtered.k == 0 {
            return Err(invalid("filtered.k", "must be greater than zero"));
        }
        check_weights("single_query.weights", self.single_query.weights)?;
        check_weights("multi_path.weights", self.multi_path.weights)?;
        Ok(())
    }
}

fn check_weights(name: &'static str, weights: WeightsConfig) -> Result<(), ConfigError> {
    let ok = |w: f32| w.is_finite() && w >= 0.0;
    if ok(weights.vector) && ok(weights.text) {
        Ok(())
    } else {
        Err(invalid(name, "weights must be finite and non-negative"))
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs, path::PathBuf};

    use super::{AppConfig, BackendKind, ConfigError};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn loads_default_when_file_missing() {
        let cfg = AppConfig::load_with_env(PathBuf::from("does-not-exist.toml").as_path(), no_env)
            .expect("config");
        assert_eq!(cfg.backend, BackendKind::Memory);
        assert_eq!(cfg.single_query.shortlist, 5);
        assert_eq!(cfg.single_query.final_size, 3);
        assert_eq!(cfg.multi_path.weights.vector, 0.6);
        assert_eq!(cfg.filtered.k, 3);
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hybrid.toml");
        fs::write(
            &path,
            "backend='qdrant'\nqdrant_url='http://localhost:6334'\nlexical_index_dir='/tmp/lex'\n\n[single_query]\nshortlist=8\n",
        )
        .expect("write");

        let cfg = AppConfig::load_with_env(path.as_path(), no_env).expect("config");
        assert_eq!(cfg.backend, BackendKind::Qdrant);
        assert_eq!(cfg.single_query.shortlist, 8);
        assert_eq!(cfg.single_query.final_size, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn env_overrides_file_values() {
        let env = HashMap::from([
            ("HYBRID_CORPUS_PATH", "demos/corpus.json"),
            ("HYBRID_VECTOR_DIM", "384"),
            ("HYBRID_LOG_JSON", "true"),
        ]);
        let cfg = AppConfig::load_with_env(PathBuf::from("missing.toml").as_path(), |k| {
            env.get(k).map(ToString::to_string)
        })
        .expect("config");
        assert_eq!(cfg.corpus_path.as_deref(), Some("demos/corpus.json"));
        assert_eq!(cfg.vector_dim, 384);
        assert!(cfg.log_json);
    }

    #[test]
    fn rejects_unparseable_dimension() {
        let err = AppConfig::load_with_env(PathBuf::from("missing.toml").as_path(), |k| {
            (k == "HYBRID_VECTOR_DIM").then(|| "eight".to_string())
        })
        .expect_err("bad dim");
        assert!(err.to_string().contains("HYBRID_VECTOR_DIM"));
    }

    #[test]
    fn memory_backend_requires_corpus() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("corpus_path")));
    }

    #[test]
    fn qdrant_backend_requires_url() {
        let cfg = AppConfig {
            backend: BackendKind::Qdrant,
            lexical_index_dir: Some("/tmp/lex".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("qdrant_url")));
    }

    #[test]
    fn rejects_final_size_above_shortlist() {
        let mut cfg = AppConfig {
            corpus_path: Some("c.json".to_string()),
            ..AppConfig::default()
        };
        cfg.single_query.final_size = 6;
        let err = cfg.validate().expect_err("final > shortlist");
        assert!(err.to_string().contains("single_query.final_size"));
    }

    #[test]
    fn rejects_negative_weights() {
        let mut cfg = AppConfig {
            corpus_path: Some("c.json".to_string()),
            ..AppConfig::default()
        };
        cfg.multi_path.weights.text = -0.4;
        let err = cfg.validate().expect_err("negative weight");
        assert!(err.to_string().contains("multi_path.weights"));
    }
}
