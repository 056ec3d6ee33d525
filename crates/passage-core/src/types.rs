//! Domain types shared by the generators, the fusion engine and the assembler.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;
pub type DocumentId = String;

/// The atomic retrievable unit.
///
/// - `id`: globally unique, stable chunk identifier
/// - `document_id`: owning document (must exist in the corpus)
/// - `chunk_index`: position within the parent document
/// - `content`: the text payload of the chunk
/// - `embedding`: optional dense vector; chunks without one are invisible to
///   vector search but still eligible for lexical and fuzzy search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    #[serde(default)]
    pub chunk_index: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A source document grouping chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Document {
    /// Text indexed for document-level lexical matches: title, summary and tags.
    pub fn metadata_text(&self) -> String {
        let mut parts = vec![self.title.as_str()];
        if let Some(summary) = self.summary.as_deref() {
            parts.push(summary);
        }
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Indicates which generator produced a candidate.
///
/// The declaration order is the canonical order of source tags in results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Keyword,
    Fuzzy,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Vector, SourceKind::Keyword, SourceKind::Fuzzy];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Vector => "vector",
            SourceKind::Keyword => "keyword",
            SourceKind::Fuzzy => "fuzzy",
        }
    }

    /// Kind of native score the generator emits before normalization.
    pub fn score_type(self) -> &'static str {
        match self {
            SourceKind::Vector => "cosine",
            SourceKind::Keyword => "calibrated_rank",
            SourceKind::Fuzzy => "trigram",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Joins source tags in canonical order, e.g. `"vector+keyword"`.
pub fn match_sources(sources: &[SourceKind]) -> String {
    let mut sorted = sources.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("+")
}

/// A chunk proposed by one generator for one query.
///
/// `raw_score` is the generator's native score (higher is better) and `rank`
/// is the 1-based position in that generator's list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub raw_score: f32,
    pub rank: usize,
    pub source: SourceKind,
}

/// A chunk after normalization and fusion.
///
/// Per-generator scores are `None` when that generator did not return the
/// chunk, which is different from a zero-score match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub vector_score: Option<f32>,
    pub keyword_score: Option<f32>,
    pub fuzzy_score: Option<f32>,
    pub weighted_score: f32,
    pub rrf_score: f32,
    pub fused_score: f32,
    pub sources: Vec<SourceKind>,
    pub rank: usize,
}

impl FusedResult {
    pub fn score_for(&self, source: SourceKind) -> Option<f32> {
        match source {
            SourceKind::Vector => self.vector_score,
            SourceKind::Keyword => self.keyword_score,
            SourceKind::Fuzzy => self.fuzzy_score,
        }
    }

    pub fn match_sources(&self) -> String {
        match_sources(&self.sources)
    }
}

/// Which generators a query activates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Keyword,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" | "semantic" => Ok(SearchMode::Vector),
            "keyword" | "text" | "lexical" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(crate::error::Error::InvalidRequest(format!("unknown search mode '{other}'"))),
        }
    }
}

/// How the lexical generator interprets query text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuerySyntax {
    /// Analyzed terms combined with OR; never a syntax error.
    #[default]
    Plain,
    /// Tantivy query grammar (AND/OR/NOT, phrases, field-less terms).
    Advanced,
}

/// Final ordering key of fused results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// `rrf_score * rrf_scale + weighted_score`
    #[default]
    Blended,
    RrfOnly,
    WeightedOnly,
}

impl FromStr for OrderingPolicy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "blended" => Ok(OrderingPolicy::Blended),
            "rrf" | "rrf_only" => Ok(OrderingPolicy::RrfOnly),
            "weighted" | "weighted_only" => Ok(OrderingPolicy::WeightedOnly),
            other => Err(crate::error::Error::InvalidRequest(format!("unknown ordering '{other}'"))),
        }
    }
}

/// What happens when an active generator fails or times out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any failed generator fails the query.
    Strict,
    /// Failed generators are reported as warnings while at least one base
    /// generator (vector or keyword) succeeded.
    #[default]
    Degraded,
}

/// Which chunks receive a document-level metadata match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DocumentMatchPolicy {
    /// The document's best chunk-level hit for the query, else its first chunk.
    #[default]
    Representative,
    AllChunks,
}
