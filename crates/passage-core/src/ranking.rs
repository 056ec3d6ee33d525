//! Turns raw generator scores into a ranked candidate list.

use crate::types::{Candidate, ChunkId, DocumentId, SourceKind};

/// A chunk with a generator-native score, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk_id: impl Into<ChunkId>, document_id: impl Into<DocumentId>, score: f32) -> Self {
        Self { chunk_id: chunk_id.into(), document_id: document_id.into(), score }
    }
}

/// Sorts by descending score (ties by chunk id ascending), keeps the first
/// `pool` entries and assigns 1-based ranks. Non-finite scores are dropped.
pub fn rank_candidates(scored: Vec<ScoredChunk>, source: SourceKind, pool: usize) -> Vec<Candidate> {
    let mut scored: Vec<ScoredChunk> = scored.into_iter().filter(|s| s.score.is_finite()).collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    scored
        .into_iter()
        .take(pool)
        .enumerate()
        .map(|(i, s)| Candidate {
            chunk_id: s.chunk_id,
            document_id: s.document_id,
            raw_score: s.score,
            rank: i + 1,
            source,
        })
        .collect()
}
