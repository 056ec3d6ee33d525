use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use passage_core::config::SearchSettings;
use passage_core::error::{Error, ErrorKind, Result};
use passage_core::traits::{FuzzyGenerator, LexicalGenerator, VectorGenerator};
use passage_core::types::{Candidate, Chunk, Document, FailurePolicy, OrderingPolicy, QuerySyntax, SearchMode, SourceKind};
use passage_core::Corpus;
use passage_hybrid::{HybridSearchEngine, SearchRequest};

/// A generator that replays a fixed candidate list.
#[derive(Clone)]
struct Scripted {
    source: SourceKind,
    candidates: Vec<Candidate>,
    fail: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    fn new(source: SourceKind, items: &[(&str, f32)]) -> Self {
        let candidates = items
            .iter()
            .enumerate()
            .map(|(i, (id, score))| Candidate {
                chunk_id: id.to_string(),
                document_id: doc_of(id).to_string(),
                raw_score: *score,
                rank: i + 1,
                source,
            })
            .collect();
        Self { source, candidates, fail: false, delay: None, calls: Arc::new(AtomicUsize::new(0)) }
    }

    fn failing(source: SourceKind) -> Self {
        Self { fail: true, ..Self::new(source, &[]) }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run(&self, pool: usize) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(Error::unavailable(self.source, "backend down"));
        }
        Ok(self.candidates.iter().take(pool).cloned().collect())
    }
}

impl VectorGenerator for Scripted {
    fn dimension(&self) -> usize {
        2
    }

    async fn nearest(&self, _query: &[f32], pool: usize) -> Result<Vec<Candidate>> {
        self.run(pool).await
    }
}

impl LexicalGenerator for Scripted {
    async fn search(&self, _query: &str, _syntax: QuerySyntax, pool: usize) -> Result<Vec<Candidate>> {
        self.run(pool).await
    }
}

impl FuzzyGenerator for Scripted {
    async fn search(&self, _query: &str, _threshold: f32, pool: usize) -> Result<Vec<Candidate>> {
        self.run(pool).await
    }
}

fn doc_of(chunk: &str) -> &'static str {
    match chunk {
        "A" | "B" => "d1",
        "C" | "D" => "d2",
        "O" => "missing",
        _ => "d3",
    }
}

fn corpus() -> Corpus {
    let documents = ["d1", "d2", "d3"]
        .iter()
        .map(|id| Document { id: id.to_string(), title: format!("Title {id}"), ..Default::default() })
        .collect();
    let chunks = ["A", "B", "C", "D", "E", "O"]
        .iter()
        .enumerate()
        .map(|(i, id)| Chunk {
            id: id.to_string(),
            document_id: doc_of(id).to_string(),
            chunk_index: i,
            content: format!("content of chunk {id}"),
            embedding: None,
        })
        .collect();
    Corpus::new(documents, chunks).expect("corpus")
}

fn settings() -> SearchSettings {
    SearchSettings { embedding_dimension: 2, lexical_calibration: 1.0, ..SearchSettings::default() }
}

fn engine(vector: &Scripted, lexical: &Scripted, fuzzy: &Scripted) -> HybridSearchEngine<Scripted, Scripted, Scripted> {
    HybridSearchEngine::new(vector.clone(), lexical.clone(), fuzzy.clone(), Arc::new(corpus()), settings()).expect("engine")
}

fn request(query: &str) -> SearchRequest {
    SearchRequest::from_settings(query, &settings()).with_embedding(vec![1.0, 0.0])
}

fn ids(response: &passage_hybrid::SearchResponse) -> Vec<&str> {
    response.results.iter().map(|h| h.chunk_id.as_str()).collect()
}

fn scenario_a() -> (Scripted, Scripted, Scripted) {
    (
        Scripted::new(SourceKind::Vector, &[("A", 0.9), ("B", 0.85), ("C", 0.5)]),
        Scripted::new(SourceKind::Keyword, &[("B", 0.9), ("D", 0.8), ("A", 0.7)]),
        Scripted::new(SourceKind::Fuzzy, &[]),
    )
}

#[tokio::test]
async fn rrf_ordering_matches_reference_example() {
    let (v, l, f) = scenario_a();
    let response = engine(&v, &l, &f)
        .search(&request("restraint of trade clause").with_ordering(OrderingPolicy::RrfOnly))
        .await
        .expect("search");
    assert_eq!(ids(&response), vec!["B", "A", "D", "C"]);

    let rrf = |id: &str| response.results.iter().find(|h| h.chunk_id == id).map(|h| h.rrf_score).unwrap_or_default();
    assert!((rrf("A") - (1.0 / 61.0 + 1.0 / 63.0)).abs() < 1e-5);
    assert!((rrf("B") - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-5);
    assert!((rrf("C") - 1.0 / 63.0).abs() < 1e-5);
    assert!((rrf("D") - 1.0 / 62.0).abs() < 1e-5);
    assert_eq!(response.results[0].match_sources, "vector+keyword");
    assert_eq!(response.results[2].match_sources, "keyword");
    assert_eq!(response.results[0].score_types, vec!["cosine", "calibrated_rank"]);
    assert_eq!(response.results[2].score_types, vec!["calibrated_rank"]);
    assert_eq!(response.results.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn blended_ordering_lets_rrf_dominate() {
    let (v, l, f) = scenario_a();
    let response = engine(&v, &l, &f).search(&request("restraint of trade clause")).await.expect("search");
    assert_eq!(ids(&response), vec!["B", "A", "D", "C"]);
    let top = &response.results[0];
    assert!((top.fused_score - (top.rrf_score * 1000.0 + top.weighted_score)).abs() < 1e-3);
}

#[tokio::test]
async fn weighted_ordering_uses_weighted_score() {
    let (v, l, f) = scenario_a();
    let response = engine(&v, &l, &f)
        .search(&request("q").with_ordering(OrderingPolicy::WeightedOnly))
        .await
        .expect("search");
    // B = 0.7*0.85 + 0.3*0.9, A = 0.7*0.9 + 0.3*0.7, C = 0.7*0.5, D = 0.3*0.8
    assert_eq!(ids(&response), vec!["B", "A", "C", "D"]);
    assert!((response.results[0].weighted_score - 0.865).abs() < 1e-5);
}

#[tokio::test]
async fn fuzzy_only_match_is_kept_with_its_own_score() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[("E", 0.8)]);
    let response = engine(&v, &l, &f).search(&request("restrant").with_fuzzy(true)).await.expect("search");

    let e = response.results.iter().find(|h| h.chunk_id == "E").expect("fuzzy-only chunk present");
    assert_eq!(e.fuzzy_score, Some(0.8));
    assert_eq!(e.vector_score, None);
    assert_eq!(e.keyword_score, None);
    assert_eq!(e.match_sources, "fuzzy");
    assert!((e.weighted_score - 0.3 * 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn min_score_excludes_low_combined_scores() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9), ("B", 0.4)]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let response = engine(&v, &l, &f)
        .search(&request("q").with_mode(SearchMode::Vector).with_weights(1.0, 0.0).with_min_score(0.5))
        .await
        .expect("search");
    assert_eq!(ids(&response), vec!["A"]);
    assert_eq!(response.stats.below_min_score, 1);
}

#[tokio::test]
async fn vector_mode_drops_chunks_with_zero_similarity() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 1.0), ("B", 0.0)]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let response = engine(&v, &l, &f).search(&request("q").with_mode(SearchMode::Vector)).await.expect("search");
    assert_eq!(ids(&response), vec!["A"]);
    assert_eq!(response.stats.zero_score, 1);
    assert_eq!(response.stats.fused, 1);
    assert_eq!(response.stats.below_min_score, 0);
}

#[tokio::test]
async fn fuzzy_scores_carry_their_score_type() {
    let v = Scripted::new(SourceKind::Vector, &[]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[("E", 0.6)]);
    let response = engine(&v, &l, &f).search(&request("q").with_fuzzy(true)).await.expect("search");
    assert_eq!(response.results[0].score_types, vec!["trigram"]);
}

#[tokio::test]
async fn empty_keyword_query_is_an_empty_success() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let eng = engine(&v, &l, &f);
    let req = SearchRequest::from_settings("   ", &settings()).with_mode(SearchMode::Keyword);
    let response = eng.search(&req).await.expect("empty query is not an error");
    assert!(response.is_empty());
    assert!(!response.is_degraded());
    assert_eq!(l.calls(), 0);
}

#[tokio::test]
async fn no_match_is_an_empty_success() {
    let v = Scripted::new(SourceKind::Vector, &[]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let response = engine(&v, &l, &f).search(&request("nothing matches")).await.expect("search");
    assert!(response.is_empty());
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn modes_only_run_their_generators() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[("E", 0.8)]);
    let eng = engine(&v, &l, &f);

    let response = eng.search(&request("q").with_mode(SearchMode::Vector).with_fuzzy(true)).await.expect("vector");
    assert_eq!(ids(&response), vec!["A"]);
    assert_eq!((v.calls(), l.calls(), f.calls()), (1, 0, 0));

    let response = eng.search(&request("q").with_mode(SearchMode::Keyword)).await.expect("keyword");
    assert_eq!(ids(&response), vec!["B"]);
    assert!(response.results.iter().all(|h| !h.sources.contains(&SourceKind::Fuzzy)));
    assert_eq!((v.calls(), l.calls(), f.calls()), (1, 1, 0));

    let response = eng.search(&request("q").with_mode(SearchMode::Keyword).with_fuzzy(true)).await.expect("keyword+fuzzy");
    assert_eq!(response.results.len(), 2);
    assert_eq!((v.calls(), l.calls(), f.calls()), (1, 2, 1));
}

#[tokio::test]
async fn precondition_errors_never_reach_generators() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let eng = engine(&v, &l, &f);

    let cases = vec![
        request("q").with_weights(-0.5, 0.3),
        request("q").with_weights(f32::NAN, 0.3),
        request("q").with_threshold(1.5),
        request("q").with_embedding(vec![1.0, 0.0, 0.0]),
        request("q").with_limit(0),
        request("q").with_limit(10_000),
        request("q").with_rrf_k(0.0),
    ];
    for req in cases {
        let err = eng.search(&req).await.expect_err("precondition");
        assert_eq!(err.kind(), ErrorKind::Client, "{err}");
        assert!(!err.is_retryable());
    }
    assert!(matches!(eng.search(&request("q").with_weights(-1.0, 0.0)).await, Err(Error::InvalidWeights(_))));
    assert!(matches!(eng.search(&request("q").with_threshold(-0.1)).await, Err(Error::InvalidThreshold(_))));
    assert!(matches!(
        eng.search(&request("q").with_embedding(vec![0.0; 3])).await,
        Err(Error::DimensionMismatch { expected: 2, actual: 3 })
    ));
    assert_eq!((v.calls(), l.calls(), f.calls()), (0, 0, 0));
}

#[tokio::test]
async fn degraded_policy_reports_failed_generators_as_warnings() {
    let v = Scripted::failing(SourceKind::Vector);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::failing(SourceKind::Fuzzy);
    let response = engine(&v, &l, &f).search(&request("q").with_fuzzy(true)).await.expect("degraded success");
    assert_eq!(ids(&response), vec!["B"]);
    assert!(response.is_degraded());
    let failed: Vec<_> = response.warnings.iter().map(|w| w.source).collect();
    assert_eq!(failed, vec![SourceKind::Vector, SourceKind::Fuzzy]);
    assert!(response.stats.vector.as_ref().is_some_and(|s| s.failed));
    assert_eq!(response.stats.keyword.as_ref().map(|s| s.candidates), Some(1));
}

#[tokio::test]
async fn all_base_generators_failing_is_an_error() {
    let v = Scripted::failing(SourceKind::Vector);
    let l = Scripted::failing(SourceKind::Keyword);
    let f = Scripted::new(SourceKind::Fuzzy, &[("E", 0.9)]);
    let err = engine(&v, &l, &f).search(&request("q").with_fuzzy(true)).await.expect_err("no base generator");
    assert!(matches!(err, Error::RetrievalUnavailable { generator: SourceKind::Vector, .. }));
    assert!(err.is_retryable());
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn keyword_mode_fails_when_lexical_fails() {
    let v = Scripted::new(SourceKind::Vector, &[]);
    let l = Scripted::failing(SourceKind::Keyword);
    let f = Scripted::new(SourceKind::Fuzzy, &[("E", 0.9)]);
    let err = engine(&v, &l, &f)
        .search(&request("q").with_mode(SearchMode::Keyword).with_fuzzy(true))
        .await
        .expect_err("lexical is the only base generator");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn strict_policy_fails_on_any_generator_failure() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::failing(SourceKind::Fuzzy);
    let err = engine(&v, &l, &f)
        .search(&request("q").with_fuzzy(true).with_failure_policy(FailurePolicy::Strict))
        .await
        .expect_err("strict");
    assert!(matches!(err, Error::RetrievalUnavailable { generator: SourceKind::Fuzzy, .. }));
}

#[tokio::test]
async fn slow_generator_times_out_as_a_failure() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]).delayed(Duration::from_secs(2));
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let eng = engine(&v, &l, &f);

    let response = eng.search(&request("q").with_timeout(Duration::from_millis(50))).await.expect("degraded");
    assert_eq!(ids(&response), vec!["B"]);
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].timed_out);

    let strict = request("q").with_timeout(Duration::from_millis(50)).with_failure_policy(FailurePolicy::Strict);
    assert!(eng.search(&strict).await.is_err());
}

#[tokio::test]
async fn unresolvable_results_are_dropped_and_backfilled() {
    let v = Scripted::new(SourceKind::Vector, &[("O", 0.99), ("ghost", 0.95), ("A", 0.9), ("B", 0.8), ("C", 0.7)]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let response = engine(&v, &l, &f)
        .search(&request("q").with_mode(SearchMode::Vector).with_limit(2))
        .await
        .expect("integrity faults are not errors");
    assert_eq!(ids(&response), vec!["A", "B"]);
    assert_eq!(response.results.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(response.stats.integrity_dropped, 2);
}

#[tokio::test]
async fn results_carry_document_metadata_and_group_by_document() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9), ("C", 0.8), ("B", 0.7)]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let response = engine(&v, &l, &f).search(&request("q").with_mode(SearchMode::Vector)).await.expect("search");
    assert_eq!(response.results[0].title, "Title d1");
    assert_eq!(response.results[0].content, "content of chunk A");

    let groups = response.group_by_document();
    let doc_ids: Vec<_> = groups.iter().map(|g| g.document_id.as_str()).collect();
    assert_eq!(doc_ids, vec!["d1", "d2"]);
    let d1: Vec<_> = groups[0].snippets.iter().map(|s| s.chunk_id.as_str()).collect();
    assert_eq!(d1, vec!["A", "B"]);
    assert_eq!(groups[0].best_rank, 1);
    assert!((groups[0].max_score - 0.7 * 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn repeated_queries_are_deterministic() {
    let v = Scripted::new(SourceKind::Vector, &[("D", 0.5), ("C", 0.5), ("B", 0.5)]);
    let l = Scripted::new(SourceKind::Keyword, &[("E", 0.5), ("A", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let eng = engine(&v, &l, &f);
    let first = eng.search(&request("q")).await.expect("first");
    let second = eng.search(&request("q")).await.expect("second");
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn every_candidate_appears_exactly_once() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9), ("B", 0.8), ("C", 0.7)]);
    let l = Scripted::new(SourceKind::Keyword, &[("C", 0.9), ("D", 0.8)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[("D", 0.5), ("E", 0.4)]);
    let response = engine(&v, &l, &f).search(&request("q").with_fuzzy(true)).await.expect("search");
    let found: Vec<_> = ids(&response);
    let unique: HashSet<_> = found.iter().copied().collect();
    assert_eq!(found.len(), unique.len());
    assert_eq!(unique, HashSet::from(["A", "B", "C", "D", "E"]));
    assert_eq!(response.stats.fused, 5);
}

#[tokio::test]
async fn request_from_settings_uses_configured_defaults() {
    let v = Scripted::new(SourceKind::Vector, &[]);
    let l = Scripted::new(SourceKind::Keyword, &[]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let eng = engine(&v, &l, &f);
    let req = eng.request_from_settings("water");
    assert_eq!(req.limit, 10);
    assert_eq!(req.rrf_k, 60.0);
    assert_eq!(req.mode, SearchMode::Hybrid);
    assert_eq!(req.active_sources(), vec![SourceKind::Vector, SourceKind::Keyword]);
}

#[tokio::test]
async fn missing_embedder_degrades_vector_search() {
    let v = Scripted::new(SourceKind::Vector, &[("A", 0.9)]);
    let l = Scripted::new(SourceKind::Keyword, &[("B", 0.5)]);
    let f = Scripted::new(SourceKind::Fuzzy, &[]);
    let req = SearchRequest::from_settings("water", &settings());
    let response = engine(&v, &l, &f).search(&req).await.expect("degraded");
    assert_eq!(ids(&response), vec!["B"]);
    assert_eq!(response.warnings[0].source, SourceKind::Vector);
    assert_eq!(v.calls(), 0);
}

#[test]
fn engine_rejects_mismatched_dimension_setting() {
    let v = Scripted::new(SourceKind::Vector, &[]);
    let result = HybridSearchEngine::new(v.clone(), v.clone(), v, Arc::new(corpus()), SearchSettings::default());
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
