use std::future::Future;

use crate::error::Result;
use crate::types::{Candidate, Chunk, Document, QuerySyntax};

/// Computes dense embeddings for query text.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Nearest-neighbour search over chunk embeddings.
///
/// Returns at most `pool` candidates ranked by descending similarity with
/// `raw_score` in `[0.0, 1.0]`. A query whose length differs from
/// [`VectorGenerator::dimension`] is rejected with `DimensionMismatch`.
pub trait VectorGenerator: Send + Sync {
    fn dimension(&self) -> usize;
    fn nearest(&self, query: &[f32], pool: usize) -> impl Future<Output = Result<Vec<Candidate>>> + Send;
}

/// Ranked full-text search over chunk text and document metadata.
pub trait LexicalGenerator: Send + Sync {
    fn search(&self, query: &str, syntax: QuerySyntax, pool: usize) -> impl Future<Output = Result<Vec<Candidate>>> + Send;
}

/// Trigram similarity search tolerant of typos.
pub trait FuzzyGenerator: Send + Sync {
    fn search(&self, query: &str, threshold: f32, pool: usize) -> impl Future<Output = Result<Vec<Candidate>>> + Send;
}

/// Read access to chunk and document metadata for result assembly.
pub trait CorpusLookup: Send + Sync {
    fn chunk(&self, id: &str) -> Option<&Chunk>;
    fn document(&self, id: &str) -> Option<&Document>;
}
