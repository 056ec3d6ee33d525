use serde::Serialize;
use std::collections::HashMap;

use passage_core::types::{ChunkId, DocumentId, FailurePolicy, OrderingPolicy, QuerySyntax, SearchMode, SourceKind};

/// One ranked chunk with its document metadata and score provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub chunk_index: usize,
    /// Chunk text, cut to the configured snippet length.
    pub content: String,
    pub title: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub original_filename: Option<String>,
    pub public_url: Option<String>,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub fuzzy_score: Option<f32>,
    pub weighted_score: f32,
    pub rrf_score: f32,
    pub fused_score: f32,
    pub sources: Vec<SourceKind>,
    /// Native score kind of each entry in `sources`, e.g. `["cosine", "trigram"]`.
    pub score_types: Vec<&'static str>,
    /// e.g. `"vector+keyword"`
    pub match_sources: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorWarning {
    pub source: SourceKind,
    pub message: String,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratorStats {
    pub candidates: usize,
    pub elapsed_ms: u64,
    pub failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub vector: Option<GeneratorStats>,
    pub keyword: Option<GeneratorStats>,
    pub fuzzy: Option<GeneratorStats>,
    pub fused: usize,
    /// Candidates dropped because every score they received was zero.
    pub zero_score: usize,
    pub below_min_score: usize,
    pub integrity_dropped: usize,
    pub total_ms: u64,
}

impl SearchStats {
    pub fn generator(&self, source: SourceKind) -> Option<&GeneratorStats> {
        match source {
            SourceKind::Vector => self.vector.as_ref(),
            SourceKind::Keyword => self.keyword.as_ref(),
            SourceKind::Fuzzy => self.fuzzy.as_ref(),
        }
    }

    pub(crate) fn set_generator(&mut self, source: SourceKind, stats: GeneratorStats) {
        match source {
            SourceKind::Vector => self.vector = Some(stats),
            SourceKind::Keyword => self.keyword = Some(stats),
            SourceKind::Fuzzy => self.fuzzy = Some(stats),
        }
    }
}

/// The effective parameters a query ran with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchParameters {
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
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub parameters: SearchParameters,
    pub results: Vec<SearchHit>,
    pub warnings: Vec<GeneratorWarning>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSnippet {
    pub chunk_id: ChunkId,
    pub chunk_index: usize,
    pub content: String,
    pub score: f32,
    pub rank: usize,
    pub match_sources: String,
}

/// Results of one document, for document-centric display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentGroup {
    pub document_id: DocumentId,
    pub title: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub original_filename: Option<String>,
    pub public_url: Option<String>,
    /// Highest weighted score among the document's hits.
    pub max_score: f32,
    /// Best rank among the document's hits.
    pub best_rank: usize,
    /// Ordered by score descending.
    pub snippets: Vec<DocumentSnippet>,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Groups hits by document, in order of each document's best-ranked hit.
    pub fn group_by_document(&self) -> Vec<DocumentGroup> {
        let mut order: Vec<DocumentId> = Vec::new();
        let mut groups: HashMap<DocumentId, DocumentGroup> = HashMap::new();
        for hit in &self.results {
            let group = groups.entry(hit.document_id.clone()).or_insert_with(|| {
                order.push(hit.document_id.clone());
                DocumentGroup {
                    document_id: hit.document_id.clone(),
                    title: hit.title.clone(),
                    category: hit.category.clone(),
                    tags: hit.tags.clone(),
                    original_filename: hit.original_filename.clone(),
                    public_url: hit.public_url.clone(),
                    max_score: hit.weighted_score,
                    best_rank: hit.rank,
                    snippets: Vec::new(),
                }
            });
            group.max_score = group.max_score.max(hit.weighted_score);
            group.best_rank = group.best_rank.min(hit.rank);
            group.snippets.push(DocumentSnippet {
                chunk_id: hit.chunk_id.clone(),
                chunk_index: hit.chunk_index,
                content: hit.content.clone(),
                score: hit.weighted_score,
                rank: hit.rank,
                match_sources: hit.match_sources.clone(),
            });
        }
        order
            .into_iter()
            .filter_map(|id| groups.remove(&id))
            .map(|mut g| {
                g.snippets.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.rank.cmp(&b.rank)));
                g
            })
            .collect()
    }
}
