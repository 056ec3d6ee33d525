//! Weighted-sum and reciprocal-rank fusion of normalized candidate lists.

use std::collections::BTreeMap;

use passage_core::error::{Error, Result};
use passage_core::types::{ChunkId, DocumentId, FusedResult, OrderingPolicy, SourceKind};

use crate::normalize::NormalizedList;

/// Per-query generator weights. The keyword weight applies to both lexical and
/// fuzzy contributions. Weights are used as given, never renormalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl FusionWeights {
    pub fn new(vector: f32, keyword: f32) -> Result<Self> {
        for (name, w) in [("vector_weight", vector), ("keyword_weight", keyword)] {
            if !w.is_finite() || w < 0.0 {
                return Err(Error::InvalidWeights(format!("{name} must be a non-negative number, got {w}")));
            }
        }
        Ok(Self { vector, keyword })
    }

    pub fn weight_for(&self, source: SourceKind) -> f32 {
        match source {
            SourceKind::Vector => self.vector,
            SourceKind::Keyword | SourceKind::Fuzzy => self.keyword,
        }
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.7, keyword: 0.3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub weights: FusionWeights,
    pub rrf_k: f32,
    pub ordering: OrderingPolicy,
    /// Multiplier on the RRF score in the blended ordering key.
    pub rrf_scale: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self { weights: FusionWeights::default(), rrf_k: 60.0, ordering: OrderingPolicy::Blended, rrf_scale: 1000.0 }
    }
}

#[derive(Default)]
struct Contributions {
    document_id: DocumentId,
    /// (normalized score, 1-based rank) per source, indexed like `SourceKind::ALL`.
    slots: [Option<(f32, usize)>; 3],
}

fn slot(source: SourceKind) -> usize {
    match source {
        SourceKind::Vector => 0,
        SourceKind::Keyword => 1,
        SourceKind::Fuzzy => 2,
    }
}

pub struct RankFusionEngine {
    params: FusionParams,
}

impl RankFusionEngine {
    pub fn new(params: FusionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FusionParams {
        &self.params
    }

    /// Full outer join of `lists` on chunk id. Each chunk appears once, scored by
    /// the weighted sum of its normalized scores and by `Σ 1/(k + rank)`, ordered by
    /// the configured key descending with chunk id ascending on ties. Ranks are
    /// 1-based positions in the returned list.
    ///
    /// A chunk needs at least one positive normalized score to be kept.
    pub fn fuse(&self, lists: &[NormalizedList]) -> Vec<FusedResult> {
        self.fuse_counted(lists).0
    }

    /// Like [`RankFusionEngine::fuse`], also returning how many chunks were
    /// dropped because every score they received was zero.
    pub fn fuse_counted(&self, lists: &[NormalizedList]) -> (Vec<FusedResult>, usize) {
        let mut merged: BTreeMap<ChunkId, Contributions> = BTreeMap::new();
        for list in lists {
            let i = slot(list.source);
            for item in &list.items {
                let c = &item.candidate;
                let entry = merged.entry(c.chunk_id.clone()).or_insert_with(|| Contributions {
                    document_id: c.document_id.clone(),
                    ..Default::default()
                });
                // A chunk listed twice by one generator keeps its best rank.
                match entry.slots[i] {
                    Some((_, rank)) if rank <= c.rank => {}
                    _ => entry.slots[i] = Some((item.score, c.rank)),
                }
            }
        }

        let candidates = merged.len();
        let p = &self.params;
        let mut fused: Vec<FusedResult> = merged
            .into_iter()
            .filter(|(_, c)| c.slots.iter().flatten().any(|(score, _)| *score > 0.0))
            .map(|(chunk_id, c)| {
                let mut weighted = 0.0f32;
                let mut rrf = 0.0f32;
                let mut sources = Vec::new();
                for source in SourceKind::ALL {
                    if let Some((score, rank)) = c.slots[slot(source)] {
                        weighted += p.weights.weight_for(source) * score;
                        rrf += 1.0 / (p.rrf_k + rank as f32);
                        sources.push(source);
                    }
                }
                let fused_score = match p.ordering {
                    OrderingPolicy::Blended => rrf * p.rrf_scale + weighted,
                    OrderingPolicy::RrfOnly => rrf,
                    OrderingPolicy::WeightedOnly => weighted,
                };
                FusedResult {
                    chunk_id,
                    document_id: c.document_id,
                    vector_score: c.slots[0].map(|(s, _)| s),
                    keyword_score: c.slots[1].map(|(s, _)| s),
                    fuzzy_score: c.slots[2].map(|(s, _)| s),
                    weighted_score: weighted,
                    rrf_score: rrf,
                    fused_score,
                    sources,
                    rank: 0,
                }
            })
            .collect();

        fused.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
        for (i, r) in fused.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        let zero_score = candidates - fused.len();
        if zero_score > 0 {
            tracing::debug!(zero_score, "dropped chunks with no positive score");
        }
        tracing::debug!(lists = lists.len(), fused = fused.len(), ordering = ?p.ordering, "fused candidates");
        (fused, zero_score)
    }
}
