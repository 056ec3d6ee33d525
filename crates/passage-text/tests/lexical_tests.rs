use std::collections::HashSet;
use tempfile::TempDir;

use passage_core::traits::{FuzzyGenerator, LexicalGenerator};
use passage_core::types::{DocumentMatchPolicy, QuerySyntax};
use passage_core::{Corpus, Error, SourceKind};
use passage_text::tantivy_utils::analyze;
use passage_text::trigram::{similarity, TrigramQuery, TrigramText};
use passage_text::{TantivyLexicalIndex, TrigramIndex};

const CORPUS: &str = r#"{
  "documents": [
    {"id": "d1", "title": "Water filtration", "tags": ["water", "survival"]},
    {"id": "d2", "title": "Solar ovens", "summary": "Cooking with sunlight"},
    {"id": "d3", "title": "Restraint of trade"}
  ],
  "chunks": [
    {"id": "c1", "document_id": "d1", "chunk_index": 0, "content": "Sand filters remove sediment before storage."},
    {"id": "c2", "document_id": "d1", "chunk_index": 1, "content": "Boiling water for one minute kills most bacteria."},
    {"id": "c3", "document_id": "d2", "chunk_index": 0, "content": "A reflective box traps heat from the sun."},
    {"id": "c4", "document_id": "d3", "chunk_index": 0, "content": "A restraint of trade clause limits future competition."}
  ]
}"#;

fn corpus() -> Corpus {
    Corpus::from_json_str(CORPUS).expect("corpus")
}

fn ram_index(policy: DocumentMatchPolicy) -> TantivyLexicalIndex {
    let index = TantivyLexicalIndex::create_in_ram().expect("index").with_document_match(policy);
    index.index_corpus(&corpus()).expect("index corpus");
    index
}

fn ids(candidates: &[passage_core::Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.chunk_id.as_str()).collect()
}

#[test]
fn analyzer_stems_and_drops_stopwords() {
    assert_eq!(analyze("The Boiling Waters of the lake"), vec!["boil", "water", "lake"]);
    assert!(analyze("the of and").is_empty());
}

#[tokio::test]
async fn plain_query_matches_stemmed_terms() {
    let index = ram_index(DocumentMatchPolicy::Representative);
    let hits = index.search("boil", QuerySyntax::Plain, 10).await.expect("search");
    assert_eq!(ids(&hits), vec!["c2"]);
    assert_eq!(hits[0].rank, 1);
    assert_eq!(hits[0].source, SourceKind::Keyword);
    assert!(hits[0].raw_score > 0.0);
}

#[tokio::test]
async fn stopword_or_empty_query_is_empty_not_error() {
    let index = ram_index(DocumentMatchPolicy::Representative);
    assert!(index.search("the of and", QuerySyntax::Plain, 10).await.expect("stopwords").is_empty());
    assert!(index.search("   ", QuerySyntax::Plain, 10).await.expect("blank").is_empty());
    assert!(index.search("", QuerySyntax::Advanced, 10).await.expect("blank advanced").is_empty());
}

#[tokio::test]
async fn metadata_match_goes_to_representative_chunk() {
    let index = ram_index(DocumentMatchPolicy::Representative);
    // No chunk text matches "filtration"; the document title does.
    let hits = index.search("filtration", QuerySyntax::Plain, 10).await.expect("search");
    assert_eq!(ids(&hits), vec!["c1"], "first chunk of the document represents it");

    // "water" hits c2 directly and d1 through title and tags.
    let hits = index.search("water", QuerySyntax::Plain, 10).await.expect("search");
    assert_eq!(ids(&hits), vec!["c2"], "best direct hit represents the document");
}

#[tokio::test]
async fn metadata_match_to_all_chunks_has_no_duplicates() {
    let index = ram_index(DocumentMatchPolicy::AllChunks);
    let hits = index.search("water survival", QuerySyntax::Plain, 10).await.expect("search");
    let unique: HashSet<_> = hits.iter().map(|c| c.chunk_id.clone()).collect();
    assert_eq!(unique.len(), hits.len());
    assert!(unique.contains("c1") && unique.contains("c2"));
    let ranks: Vec<_> = hits.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, (1..=hits.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn pool_caps_candidate_count() {
    let index = ram_index(DocumentMatchPolicy::AllChunks);
    let hits = index.search("water sun trade", QuerySyntax::Plain, 2).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits[0].raw_score >= hits[1].raw_score);
}

#[tokio::test]
async fn advanced_syntax_parses_and_reports_errors() {
    let index = ram_index(DocumentMatchPolicy::Representative);
    let hits = index.search("restraint AND trade", QuerySyntax::Advanced, 10).await.expect("search");
    assert_eq!(hits.first().map(|c| c.chunk_id.as_str()), Some("c4"));

    match index.search("nosuchfield:water", QuerySyntax::Advanced, 10).await {
        Err(Error::InvalidQuerySyntax(_)) => {}
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[tokio::test]
async fn on_disk_index_reopens() {
    let tmp = TempDir::new().unwrap();
    let built = TantivyLexicalIndex::create_in_dir(tmp.path()).expect("create");
    assert_eq!(built.index_corpus(&corpus()).expect("index"), 4);
    drop(built);

    let index = TantivyLexicalIndex::open_in_dir(tmp.path()).expect("open");
    assert_eq!(index.num_chunks(), 4);
    let hits = index.search("sediment", QuerySyntax::Plain, 5).await.expect("search");
    assert_eq!(ids(&hits), vec!["c1"]);
}

#[test]
fn trigram_similarity_bounds() {
    assert_eq!(similarity("restraint", "restraint"), 1.0);
    let typo = similarity("restrant", "restraint");
    assert!(typo >= 0.3 && typo < 1.0, "typo similarity {typo}");
    assert_eq!(similarity("", "restraint"), 0.0);
    assert_eq!(similarity("xyz", "abc"), 0.0);
}

#[test]
fn best_window_finds_phrase_inside_long_text() {
    let text = TrigramText::new("Parties agreed that a restraint of trade clause applies here");
    let query = TrigramQuery::new("restraint trade");
    let best = text.best_window_similarity(&query);
    let whole = similarity("restraint trade", "Parties agreed that a restraint of trade clause applies here");
    assert!(best > whole, "window {best} should beat whole-text {whole}");
    assert!(best <= 1.0);
}

#[tokio::test]
async fn fuzzy_tolerates_typos_and_respects_threshold() {
    let index = TrigramIndex::from_corpus(&corpus());
    let hits = FuzzyGenerator::search(&index, "sedment", 0.3, 10).await.expect("search");
    assert_eq!(hits.first().map(|c| c.chunk_id.as_str()), Some("c1"));
    assert!(hits.iter().all(|c| c.raw_score >= 0.3 && c.raw_score <= 1.0));
    assert!(hits.iter().all(|c| c.source == SourceKind::Fuzzy));

    let strict = FuzzyGenerator::search(&index, "sedment", 1.0, 10).await.expect("search");
    assert!(strict.is_empty());
}

#[tokio::test]
async fn fuzzy_uses_greatest_of_title_and_content() {
    let index = TrigramIndex::from_corpus(&corpus());
    let hits = FuzzyGenerator::search(&index, "filtration", 0.3, 10).await.expect("search");
    let mut found = ids(&hits);
    found.sort();
    assert_eq!(found, vec!["c1", "c2"]);
    assert!(hits.iter().all(|c| (c.raw_score - 1.0).abs() < 1e-6));
}

#[tokio::test]
async fn fuzzy_rejects_out_of_range_threshold() {
    let index = TrigramIndex::from_corpus(&corpus());
    for t in [-0.1, 1.5, f32::NAN] {
        assert!(matches!(FuzzyGenerator::search(&index, "water", t, 10).await, Err(Error::InvalidThreshold(_))));
    }
}
