use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result, bail};

use crate::Document;

/// Reads a JSON array of documents and checks that ids are unique and every
/// embedding has the same length.
pub fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading corpus file: {}", path.display()))?;
    let documents = serde_json::from_str::<Vec<Document>>(&raw)
        .with_context(|| format!("failed parsing corpus file: {}", path.display()))?;
    validate_corpus(&documents)?;
    tracing::debug!(
        path = %path.display(),
        documents = documents.len(),
        "loaded corpus"
    );
    Ok(documents)
}

pub fn validate_corpus(documents: &[Document]) -> Result<()> {
    let mut seen = HashSet::with_capacity(documents.len());
    for doc in documents {
        if !seen.insert(doc.doc_id) {
            bail!("duplicate doc_id {} in corpus", doc.doc_id);
        }
    }
    corpus_dimension(documents)?;
    Ok(())
}

/// Embedding length shared by the whole corpus; `None` for an empty corpus.
pub fn corpus_dimension(documents: &[Document]) -> Result<Option<usize>> {
    let Some(first) = documents.first() else {
        return Ok(None);
    };
    let dim = first.embedding.len();
    if dim == 0 {
        bail!("doc_id {} has an empty embedding", first.doc_id);
    }
    if let Some(bad) = documents.iter().find(|d| d.embedding.len() != dim) {
        bail!(
            "doc_id {} has embedding length {}, expected {dim}",
            bad.doc_id,
            bad.embedding.len()
        );
    }
    Ok(Some(dim))
}
