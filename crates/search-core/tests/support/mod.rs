#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{DocumentMeta, MetadataFilter};
use search_core::{
    CandidateSource, LexicalHit, LexicalQuery, RetrievalError, Store, StorePath, VectorHit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Ok,
    Fail,
    Hang,
}

/// A store that replays fixed hits and counts sessions and calls.
#[derive(Clone)]
pub struct ScriptedStore {
    pub dimension: usize,
    pub vector_hits: Vec<VectorHit>,
    pub lexical_hits: Vec<LexicalHit>,
    pub session: Behavior,
    pub vector: Behavior,
    pub lexical: Behavior,
    pub counters: Arc<Counters>,
}

#[derive(Default)]
pub struct Counters {
    pub acquired: AtomicUsize,
    pub open: AtomicUsize,
    pub vector_calls: AtomicUsize,
    pub lexical_calls: AtomicUsize,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn lexical_calls(&self) -> usize {
        self.lexical_calls.load(Ordering::SeqCst)
    }
}

pub fn meta(id: u64) -> DocumentMeta {
    DocumentMeta {
        doc_id: id,
        title: format!("doc {id}"),
        topic: "infrastructure".to_string(),
        audience: "engineers".to_string(),
    }
}

pub fn vhit(id: u64, distance: f32) -> VectorHit {
    VectorHit {
        meta: meta(id),
        distance,
    }
}

pub fn lhit(id: u64, relevance: f32) -> LexicalHit {
    LexicalHit {
        meta: meta(id),
        relevance,
    }
}

impl ScriptedStore {
    pub fn new(vector_hits: Vec<VectorHit>, lexical_hits: Vec<LexicalHit>) -> Self {
        Self {
            dimension: 2,
            vector_hits,
            lexical_hits,
            session: Behavior::Ok,
            vector: Behavior::Ok,
            lexical: Behavior::Ok,
            counters: Arc::new(Counters::default()),
        }
    }
}

impl Store for ScriptedStore {
    type Session = ScriptedSession;

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn acquire(&self) -> Result<ScriptedSession, RetrievalError> {
        match self.session {
            Behavior::Ok => {}
            Behavior::Fail => {
                return Err(RetrievalError::store(StorePath::Session, "connection refused"));
            }
            Behavior::Hang => std::future::pending::<()>().await,
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        self.counters.open.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            store: self.clone(),
        })
    }
}

pub struct ScriptedSession {
    store: ScriptedStore,
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.store.counters.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CandidateSource for ScriptedSession {
    async fn nearest(
        &self,
        _vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<VectorHit>, RetrievalError> {
        self.store.counters.vector_calls.fetch_add(1, Ordering::SeqCst);
        match self.store.vector {
            Behavior::Ok => {}
            Behavior::Fail => return Err(RetrievalError::store(StorePath::Vector, "timeout")),
            Behavior::Hang => std::future::pending::<()>().await,
        }
        Ok(self
            .store
            .vector_hits
            .iter()
            .filter(|h| filter.matches(&h.meta.topic, &h.meta.audience))
            .take(k)
            .cloned()
            .collect())
    }

    async fn lexical_rank(
        &self,
        query: &LexicalQuery,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<LexicalHit>, RetrievalError> {
        self.store.counters.lexical_calls.fetch_add(1, Ordering::SeqCst);
        match self.store.lexical {
            Behavior::Ok => {}
            Behavior::Fail => return Err(RetrievalError::store(StorePath::Lexical, "timeout")),
            Behavior::Hang => std::future::pending::<()>().await,
        }
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .lexical_hits
            .iter()
            .filter(|h| filter.matches(&h.meta.topic, &h.meta.audience))
            .take(k)
            .cloned()
            .collect())
    }
}
