//! Exact cosine scan over a corpus held in memory.
use passage_core::error::{Error, Result};
use passage_core::ranking::{rank_candidates, ScoredChunk};
use passage_core::traits::VectorGenerator;
use passage_core::types::{Candidate, ChunkId, DocumentId, SourceKind};
use passage_core::Corpus;

pub struct MemoryVectorIndex {
    dimension: usize,
    entries: Vec<(ChunkId, DocumentId, Vec<f32>)>,
}

impl MemoryVectorIndex {
    /// Takes every chunk with an embedding of the right dimension; others are skipped.
    pub fn from_corpus(corpus: &Corpus, dimension: usize) -> Self {
        let mut entries = Vec::new();
        for c in corpus.chunks() {
            match &c.embedding {
                Some(v) if v.len() == dimension => entries.push((c.id.clone(), c.document_id.clone(), v.clone())),
                Some(v) => tracing::warn!(chunk = %c.id, actual = v.len(), expected = dimension, "embedding skipped: wrong dimension"),
                None => {}
            }
        }
        Self { dimension, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

impl VectorGenerator for MemoryVectorIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn nearest(&self, query: &[f32], pool: usize) -> Result<Vec<Candidate>> {
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: query.len() });
        }
        let scored = self
            .entries
            .iter()
            .map(|(id, doc, v)| ScoredChunk::new(id.clone(), doc.clone(), cosine_similarity(query, v).clamp(0.0, 1.0)))
            .collect();
        Ok(rank_candidates(scored, SourceKind::Vector, pool))
    }
}
