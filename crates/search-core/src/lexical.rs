use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use common::{Document, DocumentMeta, MetadataFilter};
use tantivy::schema::Value;
use tantivy::{
    Index, IndexReader, IndexWriter, TantivyDocument, Term,
    collector::TopDocs,
    query::{BooleanQuery, ConstScoreQuery, Occur, Query, TermQuery},
    schema::{
        FAST, Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing,
        TextOptions,
    },
    tokenizer::{Token, TokenStream},
};

use crate::encoder::LexicalQuery;
use crate::source::{LexicalHit, sort_lexical_hits};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;
/// Built-in tantivy analyzer: simple tokenizer, lowercase, English stemmer.
const CONTENT_TOKENIZER: &str = "en_stem";

/// BM25 relevance over `title` and `body`, with `topic` and `audience` kept as
/// exact-match keyword fields for filtering.
pub struct TantivyLexicalIndex {
    index: Index,
    reader: IndexReader,
    fields: LexicalFields,
}

#[derive(Clone, Copy)]
struct LexicalFields {
    doc_id: Field,
    title: Field,
    content: Field,
    topic: Field,
    audience: Field,
}

impl TantivyLexicalIndex {
    pub fn new_in_memory() -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        from_index(index)
    }

    pub fn open_or_create_on_disk(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)
            .with_context(|| format!("failed creating index dir: {}", index_dir.display()))?;
        let meta = index_dir.join("meta.json");
        let index = if meta.exists() {
            Index::open_in_dir(index_dir)?
        } else {
            Index::create_in_dir(index_dir, build_schema())?
        };
        from_index(index)
    }

    /// Builds an in-memory index over `documents`.
    pub fn from_documents(documents: &[Document]) -> Result<Self> {
        let index = Self::new_in_memory()?;
        let mut writer = index.writer()?;
        for doc in documents {
            writer.add_document(doc)?;
        }
        writer.commit()?;
        Ok(index)
    }

    pub fn writer(&self) -> Result<LexicalIndexWriter<'_>> {
        let writer = self.index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
        Ok(LexicalIndexWriter {
            owner: self,
            writer,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn search(
        &self,
        query: &LexicalQuery,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<LexicalHit>> {
        let searcher = self.reader.searcher();
        let matching_pool = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
        if query.is_empty() || k == 0 || matching_pool == 0 {
            return Ok(Vec::new());
        }

        let Some(parsed) = self.build_query(query, filter)? else {
            return Ok(Vec::new());
        };
        // Every match is collected: tantivy breaks score ties by segment
        // address, so cutting at `k` here would ignore `doc_id`.
        let docs = searcher.search(&parsed, &TopDocs::with_limit(matching_pool))?;

        let mut out = Vec::with_capacity(docs.len());
        for (score, address) in docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(meta) = self.read_meta(&doc) {
                out.push(LexicalHit {
                    meta,
                    relevance: score,
                });
            }
        }
        sort_lexical_hits(&mut out);
        out.truncate(k);
        Ok(out)
    }

    /// Runs the keyword terms through the `content` field's stemming
    /// analyzer so "checklists" meets "checklist" in the index.
    fn analyze_terms(&self, query: &LexicalQuery) -> Result<BTreeSet<String>> {
        let mut analyzer = self.index.tokenizer_for_field(self.fields.content)?;
        let mut stems = BTreeSet::new();
        for term in query.terms() {
            let mut stream = analyzer.token_stream(term);
            stream.process(&mut |token: &Token| {
                stems.insert(token.text.clone());
            });
        }
        Ok(stems)
    }

    fn build_query(
        &self,
        query: &LexicalQuery,
        filter: &MetadataFilter,
    ) -> Result<Option<BooleanQuery>> {
        let terms = self
            .analyze_terms(query)?
            .into_iter()
            .map(|stem| {
                let q: Box<dyn Query> = Box::new(TermQuery::new(
                    Term::from_field_text(self.fields.content, &stem),
                    IndexRecordOption::WithFreqs,
                ));
                (Occur::Should, q)
            })
            .collect::<Vec<_>>();
        if terms.is_empty() {
            return Ok(None);
        }

        let text: Box<dyn Query> = Box::new(BooleanQuery::new(terms));
        let mut clauses = vec![(Occur::Must, text)];
        for (field, value) in [
            (self.fields.topic, filter.topic.as_deref()),
            (self.fields.audience, filter.audience.as_deref()),
        ] {
            if let Some(value) = value {
                // Zero-scored so the predicate narrows the pool without
                // changing relevance.
                let exact = TermQuery::new(
                    Term::from_field_text(field, value),
                    IndexRecordOption::Basic,
                );
                let narrowed: Box<dyn Query> = Box::new(ConstScoreQuery::new(Box::new(exact), 0.0));
                clauses.push((Occur::Must, narrowed));
            }
        }
        Ok(Some(BooleanQuery::new(clauses)))
    }

    fn read_meta(&self, doc: &TantivyDocument) -> Option<DocumentMeta> {
        let text = |field: Field| {
            doc.get_first(field)
                .and_then(|v| v.as_value().as_str().map(ToOwned::to_owned))
                .unwrap_or_default()
        };
        let doc_id = doc
            .get_first(self.fields.doc_id)
            .and_then(|v| v.as_value().as_u64())?;
        Some(DocumentMeta {
            doc_id,
            title: text(self.fields.title),
            topic: text(self.fields.topic),
            audience: text(self.fields.audience),
        })
    }
}

pub struct LexicalIndexWriter<'a> {
    owner: &'a TantivyLexicalIndex,
    writer: IndexWriter,
}

impl LexicalIndexWriter<'_> {
    pub fn reset(&mut self) -> Result<()> {
        self.writer.delete_all_documents()?;
        Ok(())
    }

    pub fn add_document(&mut self, document: &Document) -> Result<()> {
        let fields = self.owner.fields;
        let mut doc = TantivyDocument::default();
        doc.add_u64(fields.doc_id, document.doc_id);
        doc.add_text(fields.title, &document.title);
        doc.add_text(
            fields.content,
            format!("{} {}", document.title, document.body),
        );
        doc.add_text(fields.topic, &document.topic);
        doc.add_text(fields.audience, &document.audience);
        self.writer.add_document(doc)?;
        Ok(())
    }

    pub fn commit(mut self) -> Result<()> {
        self.writer.commit()?;
        self.owner.reader.reload()?;
        Ok(())
    }
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    let _ = schema_builder.add_u64_field("doc_id", INDEXED | STORED | FAST);
    let _ = schema_builder.add_text_field("title", STORED);
    let content = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(CONTENT_TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let _ = schema_builder.add_text_field("content", content);
    let _ = schema_builder.add_text_field("topic", STRING | STORED);
    let _ = schema_builder.add_text_field("audience", STRING | STORED);
    schema_builder.build()
}

fn from_index(index: Index) -> Result<TantivyLexicalIndex> {
    let schema = index.schema();
    let fields = LexicalFields {
        doc_id: schema.get_field("doc_id")?,
        title: schema.get_field("title")?,
        content: schema.get_field("content")?,
        topic: schema.get_field("topic")?,
        audience: schema.get_field("audience")?,
    };
    let reader = index.reader()?;
    Ok(TantivyLexicalIndex {
        index,
        reader,
        fields,
    })
}
