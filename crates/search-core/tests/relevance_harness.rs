use std::{fs, path::PathBuf};

use common::{MetadataFilter, corpus};
use search_core::LexicalQuery;
use search_core::lexical::TantivyLexicalIndex;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RelevanceCase {
    keywords: String,
    expected_doc_id: u64,
}

#[test]
fn lexical_relevance_harness_matches_fixture_expectations() {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let fixture_path = manifest.join("tests").join("fixtures").join("relevance.json");
    let raw = fs::read_to_string(fixture_path).expect("fixture");
    let cases: Vec<RelevanceCase> = serde_json::from_str(&raw).expect("parse fixture");

    let documents =
        corpus::load_corpus(&manifest.join("../../demos/corpus.json")).expect("demo corpus");
    let index = TantivyLexicalIndex::from_documents(&documents).expect("index");

    for case in &cases {
        let hits = index
            .search(&LexicalQuery::parse(&case.keywords), 1, &MetadataFilter::default())
            .expect("search");
        assert_eq!(
            hits.first().map(|h| h.meta.doc_id),
            Some(case.expected_doc_id),
            "keywords: {}",
            case.keywords
        );
    }
}
