use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use common::{DocId, Document, DocumentMeta, MetadataFilter};
use qdrant_client::{
    Qdrant,
    qdrant::{
        Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, QueryPointsBuilder,
        ScoredPoint, UpsertPointsBuilder, VectorParamsBuilder, point_id::PointIdOptions,
        value::Kind,
    },
};

use crate::encoder::LexicalQuery;
use crate::error::{self, RetrievalError, StorePath};
use crate::lexical::TantivyLexicalIndex;
use crate::source::{CandidateSource, LexicalHit, Store, VectorHit, sort_vector_hits};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSearchConfig {
    pub collection: String,
    pub distance: Distance,
    pub vector_dim: usize,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            collection: "rag_documents".to_string(),
            distance: Distance::Euclid,
            vector_dim: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QdrantVectorStore {
    config: VectorSearchConfig,
}

impl QdrantVectorStore {
    pub const fn new(config: VectorSearchConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &VectorSearchConfig {
        &self.config
    }

    pub async fn ensure_collection(&self, client: &Qdrant) -> Result<()> {
        let builder = CreateCollectionBuilder::new(self.config.collection.clone()).vectors_config(
            VectorParamsBuilder::new(self.config.vector_dim as u64, self.config.distance),
        );

        let result = client.create_collection(builder).await;
        if let Err(err) = result {
            let msg = err.to_string().to_lowercase();
            if !msg.contains("already exists") {
                return Err(err.into());
            }
        }
        Ok(())
    }

    pub async fn upsert_documents(&self, client: &Qdrant, documents: &[Document]) -> Result<()> {
        let points = documents
            .iter()
            .map(|doc| {
                PointStruct::new(
                    doc.doc_id,
                    doc.embedding.clone(),
                    [
                        ("title", doc.title.clone().into()),
                        ("topic", doc.topic.clone().into()),
                        ("audience", doc.audience.clone().into()),
                    ],
                )
            })
            .collect::<Vec<_>>();

        client
            .upsert_points(
                UpsertPointsBuilder::new(self.config.collection.clone(), points).wait(true),
            )
            .await?;
        Ok(())
    }

    /// Nearest `top_k` hits with ties broken by `doc_id`. Qdrant orders
    /// equal distances arbitrarily, so the limit grows until the distance at
    /// the cut is no longer repeated past it.
    pub async fn search_nearest(
        &self,
        client: &Qdrant,
        query_vector: Vec<f32>,
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let payload = payload_filter(filter);
        let mut limit = top_k.saturating_add(1);
        loop {
            let mut builder = QueryPointsBuilder::new(self.config.collection.clone())
                .query(query_vector.clone())
                .limit(limit as u64)
                .with_payload(true);
            if let Some(payload) = payload.clone() {
                builder = builder.filter(payload);
            }
            let response = client.query(builder).await?;
            let exhausted = response.result.len() < limit;

            let mut hits = response
                .result
                .iter()
                .filter_map(hit_from_point)
                .collect::<Vec<_>>();
            sort_vector_hits(&mut hits);
            if exhausted || cutoff_settled(&hits, top_k) {
                hits.truncate(top_k);
                return Ok(hits);
            }
            limit = limit.saturating_mul(2);
        }
    }
}

/// True when the last fetched hit is strictly farther than the `k`-th, so no
/// unfetched point can tie with the cut.
fn cutoff_settled(sorted: &[VectorHit], k: usize) -> bool {
    match (sorted.get(k.saturating_sub(1)), sorted.last()) {
        (Some(kth), Some(last)) => last.distance > kth.distance,
        _ => true,
    }
}

/// Equality conditions on the `topic` / `audience` payload keys, evaluated
/// by qdrant before ranking.
pub fn payload_filter(filter: &MetadataFilter) -> Option<Filter> {
    let conditions = [("topic", &filter.topic), ("audience", &filter.audience)]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| Condition::matches(key, v.clone()))
        })
        .collect::<Vec<_>>();
    if conditions.is_empty() {
        None
    } else {
        Some(Filter::must(conditions))
    }
}

fn hit_from_point(point: &ScoredPoint) -> Option<VectorHit> {
    let doc_id: DocId = match point.id.as_ref()?.point_id_options.as_ref()? {
        PointIdOptions::Num(id) => *id,
        PointIdOptions::Uuid(_) => return None,
    };
    let text = |key: &str| {
        point
            .payload
            .get(key)
            .and_then(|value| value.kind.as_ref())
            .and_then(|kind| match kind {
                Kind::StringValue(v) => Some(v.clone()),
                _ => None,
            })
            .unwrap_or_default()
    };
    Some(VectorHit {
        meta: DocumentMeta {
            doc_id,
            title: text("title"),
            topic: text("topic"),
            audience: text("audience"),
        },
        distance: point.score,
    })
}

/// Vector path served by a qdrant collection (Euclid distance), lexical path
/// by an on-disk tantivy index holding the same documents.
pub struct QdrantStore {
    url: String,
    vectors: QdrantVectorStore,
    lexical: Arc<TantivyLexicalIndex>,
}

impl QdrantStore {
    pub fn open(url: &str, config: VectorSearchConfig, lexical_index_dir: &Path) -> Result<Self> {
        let lexical = TantivyLexicalIndex::open_or_create_on_disk(lexical_index_dir)?;
        Ok(Self {
            url: url.to_string(),
            vectors: QdrantVectorStore::new(config),
            lexical: Arc::new(lexical),
        })
    }

    /// Replaces the collection contents and the lexical index with
    /// `documents`.
    pub async fn load_corpus(&self, documents: &[Document]) -> Result<()> {
        let client = Qdrant::from_url(&self.url).build()?;
        self.vectors.ensure_collection(&client).await?;
        self.vectors.upsert_documents(&client, documents).await?;

        let mut writer = self.lexical.writer()?;
        writer.reset()?;
        for doc in documents {
            writer.add_document(doc)?;
        }
        writer.commit()?;
        tracing::info!(
            collection = %self.vectors.config().collection,
            documents = documents.len(),
            "loaded corpus into qdrant and lexical index"
        );
        Ok(())
    }
}

impl Store for QdrantStore {
    type Session = QdrantSession;

    fn dimension(&self) -> usize {
        self.vectors.config().vector_dim
    }

    async fn acquire(&self) -> error::Result<QdrantSession> {
        let client = Qdrant::from_url(&self.url)
            .build()
            .map_err(|err| RetrievalError::store(StorePath::Session, err))?;
        client
            .health_check()
            .await
            .map_err(|err| RetrievalError::store(StorePath::Session, err))?;
        Ok(QdrantSession {
            client,
            vectors: self.vectors.clone(),
            lexical: Arc::clone(&self.lexical),
        })
    }
}

pub struct QdrantSession {
    client: Qdrant,
    vectors: QdrantVectorStore,
    lexical: Arc<TantivyLexicalIndex>,
}

impl CandidateSource for QdrantSession {
    async fn nearest(
        &self,
        vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> error::Result<Vec<VectorHit>> {
        self.vectors
            .search_nearest(&self.client, vector.to_vec(), k, filter)
            .await
            .map_err(|err| RetrievalError::store(StorePath::Vector, format!("{err:#}")))
    }

    async fn lexical_rank(
        &self,
        query: &LexicalQuery,
        k: usize,
        filter: &MetadataFilter,
    ) -> error::Result<Vec<LexicalHit>> {
        self.lexical
            .search(query, k, filter)
            .map_err(|err| RetrievalError::store(StorePath::Lexical, format!("{err:#}")))
    }
}
