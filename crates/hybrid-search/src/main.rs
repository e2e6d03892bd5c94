use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::{AppConfig, BackendKind, MetadataFilter, corpus};
use search_core::{
    FusionWeights, HybridRetriever, MemoryStore, QdrantStore, RankedCandidate, RetrievalDefaults,
    RetrievalError, RetrievalMode, RetrievalRequest, Store, VectorSearchConfig,
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "hybrid-search")]
#[command(about = "Hybrid vector and keyword retrieval over a document collection")]
struct Cli {
    /// TOML config file; missing files fall back to defaults.
    #[arg(long, global = true, default_value = "hybrid-search.toml")]
    config: PathBuf,
    /// Print results as JSON instead of one line per document.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Vector shortlist reranked with keyword relevance.
    Fusion {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        shortlist: Option<usize>,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Vector and keyword paths run concurrently, merged, then reranked.
    MultiPath {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        vector_k: Option<usize>,
        #[arg(long)]
        lexical_k: Option<usize>,
        #[command(flatten)]
        tuning: TuningArgs,
    },
    /// Nearest neighbours restricted by topic and audience.
    Filtered {
        #[arg(long, allow_hyphen_values = true)]
        vector: QueryVector,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        k: Option<usize>,
    },
    /// Seed the configured backend from a JSON corpus.
    Load {
        /// Defaults to `corpus_path` from the config.
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Comma-separated query embedding, e.g. "0.1,0.2,0.3".
    #[arg(long, allow_hyphen_values = true)]
    vector: QueryVector,
    #[arg(long, default_value = "")]
    keywords: String,
    /// Fail when the keywords contain no searchable terms.
    #[arg(long)]
    require_keywords: bool,
    #[command(flatten)]
    filter: FilterArgs,
}

/// A comma-separated embedding such as `0.1,-0.2,0.3`.
#[derive(Debug, Clone, PartialEq)]
struct QueryVector(Vec<f32>);

impl FromStr for QueryVector {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.split(',')
            .map(str::trim)
            .enumerate()
            .map(|(idx, part)| {
                if part.is_empty() {
                    return Err(format!("component {} is empty", idx + 1));
                }
                part.parse::<f32>()
                    .map_err(|_| format!("`{part}` is not a number"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

#[derive(Debug, Args)]
struct FilterArgs {
    #[arg(long)]
    topic: Option<String>,
    #[arg(long)]
    audience: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> MetadataFilter {
        MetadataFilter::new(self.topic, self.audience)
    }
}

#[derive(Debug, Args)]
struct TuningArgs {
    #[arg(long)]
    final_size: Option<usize>,
    #[arg(long)]
    vector_weight: Option<f32>,
    #[arg(long)]
    text_weight: Option<f32>,
}

impl TuningArgs {
    fn apply(&self, mut request: RetrievalRequest) -> RetrievalRequest {
        if let Some(final_size) = self.final_size {
            request = request.with_final_size(final_size);
        }
        if self.vector_weight.is_some() || self.text_weight.is_some() {
            let base = request.effective_weights();
            request = request.with_weights(FusionWeights {
                vector: self.vector_weight.unwrap_or(base.vector),
                text: self.text_weight.unwrap_or(base.text),
            });
        }
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = AppConfig::load(&cli.config)?;
    init_tracing(cfg.log_json);
    if let Commands::Load {
        corpus: Some(path),
    } = &cli.command
    {
        cfg.corpus_path = Some(path.display().to_string());
    }
    cfg.validate().map_err(RetrievalError::from)?;

    let mut defaults = RetrievalDefaults::from(&cfg);
    let request = match cli.command {
        Commands::Load { .. } => return load(&cfg).await,
        Commands::Fusion {
            query,
            shortlist,
            tuning,
        } => {
            if let Some(shortlist) = shortlist {
                defaults.shortlist = shortlist;
            }
            let request = RetrievalRequest::single_query(&defaults, query.vector.0, query.keywords);
            tuning.apply(query_request(request, query.require_keywords, query.filter))
        }
        Commands::MultiPath {
            query,
            vector_k,
            lexical_k,
            tuning,
        } => {
            if let Some(vector_k) = vector_k {
                defaults.vector_k = vector_k;
            }
            if let Some(lexical_k) = lexical_k {
                defaults.lexical_k = lexical_k;
            }
            let request = RetrievalRequest::multi_path(&defaults, query.vector.0, query.keywords);
            tuning.apply(query_request(request, query.require_keywords, query.filter))
        }
        Commands::Filtered { vector, filter, k } => {
            if let Some(k) = k {
                defaults.filtered_k = k;
            }
            RetrievalRequest::filtered(&defaults, vector.0, filter.into_filter())
        }
    };

    let results = match cfg.backend {
        BackendKind::Memory => {
            let corpus_path = cfg.corpus_path.as_deref().context("corpus_path is not set")?;
            let store = MemoryStore::from_corpus_file(Path::new(corpus_path))?;
            run_query(store, &request).await?
        }
        BackendKind::Qdrant => run_query(open_qdrant(&cfg)?, &request).await?,
    };

    print_results(&results, request.mode, cli.json)
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn query_request(
    request: RetrievalRequest,
    require_keywords: bool,
    filter: FilterArgs,
) -> RetrievalRequest {
    let request = request.with_filter(filter.into_filter());
    if require_keywords {
        request.requiring_keywords()
    } else {
        request
    }
}

/// Runs the query until it finishes or Ctrl-C arrives; dropping the
/// retrieval future on interrupt releases its session.
async fn run_query<S: Store>(
    store: S,
    request: &RetrievalRequest,
) -> anyhow::Result<Vec<RankedCandidate>> {
    let retriever = HybridRetriever::new(store);
    tokio::select! {
        outcome = retriever.retrieve(request) => Ok(outcome?),
        _ = tokio::signal::ctrl_c() => {
            warn!("query cancelled by interrupt");
            anyhow::bail!("query cancelled")
        }
    }
}

fn open_qdrant(cfg: &AppConfig) -> anyhow::Result<QdrantStore> {
    let url = cfg.qdrant_url.as_deref().context("qdrant_url is not set")?;
    let index_dir = cfg
        .lexical_index_dir
        .as_deref()
        .context("lexical_index_dir is not set")?;
    let vectors = VectorSearchConfig {
        collection: cfg.collection.clone(),
        vector_dim: cfg.vector_dim,
        ..VectorSearchConfig::default()
    };
    QdrantStore::open(url, vectors, Path::new(index_dir))
}

async fn load(cfg: &AppConfig) -> anyhow::Result<()> {
    let corpus_path = cfg
        .corpus_path
        .as_deref()
        .map(PathBuf::from)
        .context("no corpus given; pass --corpus or set corpus_path")?;
    let documents = corpus::load_corpus(&corpus_path)?;

    match cfg.backend {
        BackendKind::Memory => {
            let store = MemoryStore::new(documents)?;
            println!(
                "corpus ok: {} documents, dimension {}",
                store.len(),
                store.dimension()
            );
        }
        BackendKind::Qdrant => {
            if let Some(dim) = corpus::corpus_dimension(&documents)?
                && dim != cfg.vector_dim
            {
                anyhow::bail!(
                    "corpus embeddings have {dim} dimensions, vector_dim is {}",
                    cfg.vector_dim
                );
            }
            open_qdrant(cfg)?.load_corpus(&documents).await?;
            println!(
                "loaded {} documents into {}",
                documents.len(),
                cfg.collection
            );
        }
    }
    info!(corpus = %corpus_path.display(), "load finished");
    Ok(())
}

fn print_results(
    results: &[RankedCandidate],
    mode: RetrievalMode,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("no results");
        return Ok(());
    }
    for r in results {
        let scores = match mode {
            RetrievalMode::FilteredVector { .. } => format!("distance={:.3}", -r.vector_score),
            _ => format!(
                "vector_score={:.3} text_score={:.3} fused={:.3}",
                r.vector_score, r.text_score, r.fused_score
            ),
        };
        println!(
            "- doc_id={} title={:?} topic={} audience={} {scores}",
            r.meta.doc_id, r.meta.title, r.meta.topic, r.meta.audience
        );
    }
    Ok(())
}
