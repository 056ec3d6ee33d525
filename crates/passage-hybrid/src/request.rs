use serde::Serialize;
use std::time::Duration;

use passage_core::config::SearchSettings;
use passage_core::error::{Error, Result};
use passage_core::types::{FailurePolicy, OrderingPolicy, QuerySyntax, SearchMode, SourceKind};

use crate::fusion::FusionWeights;
use crate::response::SearchParameters;

/// A single search call. Build with [`SearchRequest::new`] or
/// [`SearchRequest::from_settings`] and adjust with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    /// Precomputed query embedding; when absent the engine embeds `query`.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub mode: SearchMode,
    pub limit: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub fuzzy_enabled: bool,
    pub similarity_threshold: f32,
    pub min_score: f32,
    pub rrf_k: f32,
    pub ordering: OrderingPolicy,
    pub query_syntax: QuerySyntax,
    pub failure_policy: FailurePolicy,
    /// Deadline for each generator call.
    pub timeout: Duration,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self::from_settings(query, &SearchSettings::default())
    }

    pub fn from_settings(query: impl Into<String>, settings: &SearchSettings) -> Self {
        Self {
            query: query.into(),
            embedding: None,
            mode: SearchMode::Hybrid,
            limit: settings.default_limit,
            vector_weight: settings.vector_weight,
            keyword_weight: settings.keyword_weight,
            fuzzy_enabled: settings.fuzzy_enabled,
            similarity_threshold: settings.similarity_threshold,
            min_score: settings.min_score,
            rrf_k: settings.rrf_k,
            ordering: settings.ordering,
            query_syntax: QuerySyntax::Plain,
            failure_policy: settings.failure_policy,
            timeout: Duration::from_millis(settings.generator_timeout_ms),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_weights(mut self, vector: f32, keyword: f32) -> Self {
        self.vector_weight = vector;
        self.keyword_weight = keyword;
        self
    }

    pub fn with_fuzzy(mut self, enabled: bool) -> Self {
        self.fuzzy_enabled = enabled;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_rrf_k(mut self, k: f32) -> Self {
        self.rrf_k = k;
        self
    }

    pub fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn with_syntax(mut self, syntax: QuerySyntax) -> Self {
        self.query_syntax = syntax;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks every precondition. Nothing is sent to a generator when this fails.
    pub fn validate(&self, dimension: usize, max_limit: usize) -> Result<()> {
        if self.limit == 0 || self.limit > max_limit {
            return Err(Error::InvalidRequest(format!("limit must be in 1..={max_limit}, got {}", self.limit)));
        }
        self.weights()?;
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidThreshold(self.similarity_threshold));
        }
        if !self.min_score.is_finite() {
            return Err(Error::InvalidRequest(format!("min_score must be finite, got {}", self.min_score)));
        }
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(Error::InvalidRequest(format!("rrf_k must be positive, got {}", self.rrf_k)));
        }
        if self.timeout.is_zero() {
            return Err(Error::InvalidRequest("timeout must be non-zero".into()));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch { expected: dimension, actual: embedding.len() });
            }
        }
        Ok(())
    }

    pub fn weights(&self) -> Result<FusionWeights> {
        FusionWeights::new(self.vector_weight, self.keyword_weight)
    }

    /// Generators this request runs, in canonical order.
    pub fn active_sources(&self) -> Vec<SourceKind> {
        let mut sources = match self.mode {
            SearchMode::Vector => return vec![SourceKind::Vector],
            SearchMode::Keyword => vec![SourceKind::Keyword],
            SearchMode::Hybrid => vec![SourceKind::Vector, SourceKind::Keyword],
        };
        if self.fuzzy_enabled {
            sources.push(SourceKind::Fuzzy);
        }
        sources
    }

    pub fn parameters(&self) -> SearchParameters {
        SearchParameters {
            mode: self.mode,
            limit: self.limit,
            vector_weight: self.vector_weight,
            keyword_weight: self.keyword_weight,
            fuzzy_enabled: self.fuzzy_enabled,
            similarity_threshold: self.similarity_threshold,
            min_score: self.min_score,
            rrf_k: self.rrf_k,
            ordering: self.ordering,
            query_syntax: self.query_syntax,
            failure_policy: self.failure_policy,
        }
    }
}
