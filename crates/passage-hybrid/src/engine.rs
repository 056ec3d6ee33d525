use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use passage_core::config::SearchSettings;
use passage_core::error::{Error, ErrorKind, Result};
use passage_core::traits::{CorpusLookup, Embedder, FuzzyGenerator, LexicalGenerator, VectorGenerator};
use passage_core::types::{Candidate, FailurePolicy, SourceKind};

use crate::assemble::ResultAssembler;
use crate::fusion::{FusionParams, RankFusionEngine};
use crate::normalize::{LexicalScoreCalibration, ScoreNormalizer};
use crate::request::SearchRequest;
use crate::response::{GeneratorStats, GeneratorWarning, SearchResponse, SearchStats};

struct Outcome {
    source: SourceKind,
    result: Result<Vec<Candidate>>,
    elapsed: Duration,
    timed_out: bool,
}

async fn timed<Fut>(source: SourceKind, deadline: Duration, fut: Fut) -> Outcome
where
    Fut: Future<Output = Result<Vec<Candidate>>>,
{
    let start = Instant::now();
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => Outcome { source, result, elapsed: start.elapsed(), timed_out: false },
        Err(_) => Outcome {
            source,
            result: Err(Error::unavailable(source, format!("timed out after {} ms", deadline.as_millis()))),
            elapsed: start.elapsed(),
            timed_out: true,
        },
    }
}

/// Runs the active generators concurrently, then normalizes, fuses and
/// assembles their candidates.
pub struct HybridSearchEngine<V, L, F> {
    vector: V,
    lexical: L,
    fuzzy: F,
    corpus: Arc<dyn CorpusLookup>,
    embedder: Option<Arc<dyn Embedder>>,
    settings: SearchSettings,
    normalizer: ScoreNormalizer,
    assembler: ResultAssembler,
}

impl<V, L, F> HybridSearchEngine<V, L, F>
where
    V: VectorGenerator,
    L: LexicalGenerator,
    F: FuzzyGenerator,
{
    pub fn new(vector: V, lexical: L, fuzzy: F, corpus: Arc<dyn CorpusLookup>, settings: SearchSettings) -> Result<Self> {
        settings.validate()?;
        if vector.dimension() != settings.embedding_dimension {
            return Err(Error::InvalidConfig(format!(
                "vector index has dimension {}, configured embedding_dimension is {}",
                vector.dimension(),
                settings.embedding_dimension
            )));
        }
        let normalizer = ScoreNormalizer::new(LexicalScoreCalibration::new(settings.lexical_calibration)?);
        let assembler = ResultAssembler::new(settings.snippet_chars);
        Ok(Self { vector, lexical, fuzzy, corpus, embedder: None, settings, normalizer, assembler })
    }

    /// Used when a request carries no precomputed embedding.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// A request carrying the configured defaults.
    pub fn request_from_settings(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest::from_settings(query, &self.settings)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        request.validate(self.vector.dimension(), self.settings.max_limit)?;
        let weights = request.weights()?;
        let active = request.active_sources();

        let mut response = SearchResponse {
            query: request.query.clone(),
            mode: request.mode,
            parameters: request.parameters(),
            results: Vec::new(),
            warnings: Vec::new(),
            stats: SearchStats::default(),
        };
        if request.query.trim().is_empty() && request.embedding.is_none() {
            tracing::debug!("empty query");
            response.stats.total_ms = started.elapsed().as_millis() as u64;
            return Ok(response);
        }

        let pool = self.settings.candidate_pool(request.limit);
        let run = |s: SourceKind| active.contains(&s);
        let (vector, lexical, fuzzy) = tokio::join!(
            async {
                if !run(SourceKind::Vector) { return None; }
                Some(timed(SourceKind::Vector, request.timeout, self.vector_candidates(request, pool)).await)
            },
            async {
                if !run(SourceKind::Keyword) { return None; }
                let fut = self.lexical.search(&request.query, request.query_syntax, pool);
                Some(timed(SourceKind::Keyword, request.timeout, fut).await)
            },
            async {
                if !run(SourceKind::Fuzzy) { return None; }
                let fut = self.fuzzy.search(&request.query, request.similarity_threshold, pool);
                Some(timed(SourceKind::Fuzzy, request.timeout, fut).await)
            },
        );

        let mut lists = Vec::new();
        let mut base_failures = Vec::new();
        for Outcome { source, result, elapsed, timed_out } in [vector, lexical, fuzzy].into_iter().flatten() {
            let mut stats = GeneratorStats { candidates: 0, elapsed_ms: elapsed.as_millis() as u64, failed: false };
            match result {
                Ok(candidates) => {
                    stats.candidates = candidates.len();
                    lists.push(self.normalizer.normalize_list(source, candidates));
                }
                Err(e) if e.kind() == ErrorKind::Client => return Err(e),
                Err(e) => {
                    if request.failure_policy == FailurePolicy::Strict {
                        return Err(e);
                    }
                    tracing::warn!(source = %source, error = %e, timed_out, "generator failed, continuing without it");
                    stats.failed = true;
                    response.warnings.push(GeneratorWarning { source, message: e.to_string(), timed_out });
                    if source != SourceKind::Fuzzy {
                        base_failures.push(e);
                    }
                }
            }
            response.stats.set_generator(source, stats);
        }
        let base_active = active.iter().filter(|s| **s != SourceKind::Fuzzy).count();
        if base_active > 0 && base_failures.len() == base_active {
            if let Some(e) = base_failures.into_iter().next() {
                return Err(e);
            }
        }

        let fusion = RankFusionEngine::new(FusionParams {
            weights,
            rrf_k: request.rrf_k,
            ordering: request.ordering,
            rrf_scale: self.settings.rrf_scale,
        });
        let (mut fused, zero_score) = fusion.fuse_counted(&lists);
        response.stats.fused = fused.len();
        response.stats.zero_score = zero_score;
        fused.retain(|r| r.weighted_score >= request.min_score);
        response.stats.below_min_score = response.stats.fused - fused.len();

        let assembled = self.assembler.assemble(fused, request.limit, self.corpus.as_ref());
        response.stats.integrity_dropped = assembled.dropped;
        response.results = assembled.hits;
        response.stats.total_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            mode = %request.mode,
            results = response.results.len(),
            fused = response.stats.fused,
            warnings = response.warnings.len(),
            ms = response.stats.total_ms,
            "search finished"
        );
        Ok(response)
    }

    async fn vector_candidates(&self, request: &SearchRequest, pool: usize) -> Result<Vec<Candidate>> {
        let embedding = match &request.embedding {
            Some(e) => e.clone(),
            None => self.embed_query(&request.query).await?,
        };
        self.vector.nearest(&embedding, pool).await
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let Some(embedder) = self.embedder.clone() else {
            return Err(Error::unavailable(SourceKind::Vector, "no query embedding supplied and no embedder configured"));
        };
        let text = query.to_string();
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text]))
            .await
            .map_err(|e| Error::unavailable(SourceKind::Vector, e))?
            .map_err(|e| Error::unavailable(SourceKind::Vector, format!("query embedding failed: {e}")))?;
        let embedding = vectors.pop().ok_or_else(|| Error::unavailable(SourceKind::Vector, "embedder returned no vector"))?;
        if embedding.len() != self.vector.dimension() {
            return Err(Error::unavailable(
                SourceKind::Vector,
                format!("embedder produced {} dimensions, index expects {}", embedding.len(), self.vector.dimension()),
            ));
        }
        Ok(embedding)
    }
}
