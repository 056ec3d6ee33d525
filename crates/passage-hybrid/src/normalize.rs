//! Maps generator-native scores onto a shared `[0.0, 1.0]` scale.

use passage_core::error::{Error, Result};
use passage_core::types::{Candidate, SourceKind};

/// Multiplier for raw lexical scores. Depends on the ranking function and the
/// corpus, so it is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalScoreCalibration(f32);

impl LexicalScoreCalibration {
    pub fn new(factor: f32) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::InvalidConfig(format!("lexical calibration must be positive, got {factor}")));
        }
        Ok(Self(factor))
    }

    pub fn factor(self) -> f32 {
        self.0
    }
}

impl Default for LexicalScoreCalibration {
    fn default() -> Self {
        Self(10.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCandidate {
    pub candidate: Candidate,
    pub score: f32,
}

/// One generator's candidates with normalized scores, in generator rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedList {
    pub source: SourceKind,
    pub items: Vec<NormalizedCandidate>,
}

impl NormalizedList {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreNormalizer {
    lexical: LexicalScoreCalibration,
}

impl ScoreNormalizer {
    pub fn new(lexical: LexicalScoreCalibration) -> Self {
        Self { lexical }
    }

    /// Vector and fuzzy scores pass through; lexical scores are scaled by the
    /// calibration factor. NaN and non-positive inputs map to 0, the result is
    /// clamped to 1.
    pub fn normalize(&self, kind: SourceKind, raw: f32) -> f32 {
        if raw.is_nan() || raw <= 0.0 {
            return 0.0;
        }
        let scaled = match kind {
            SourceKind::Keyword => raw * self.lexical.factor(),
            SourceKind::Vector | SourceKind::Fuzzy => raw,
        };
        scaled.min(1.0)
    }

    pub fn normalize_list(&self, source: SourceKind, candidates: Vec<Candidate>) -> NormalizedList {
        let items = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.normalize(source, candidate.raw_score);
                NormalizedCandidate { candidate, score }
            })
            .collect();
        NormalizedList { source, items }
    }
}
