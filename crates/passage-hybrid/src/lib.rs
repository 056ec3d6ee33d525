//! passage-hybrid
//!
//! Score normalization, weighted and reciprocal-rank fusion, result assembly
//! and the `HybridSearchEngine` that drives the candidate generators.
pub mod assemble;
pub mod engine;
pub mod fusion;
pub mod normalize;
pub mod request;
pub mod response;

pub use engine::HybridSearchEngine;
pub use fusion::{FusionParams, FusionWeights, RankFusionEngine};
pub use normalize::{LexicalScoreCalibration, ScoreNormalizer};
pub use request::SearchRequest;
pub use response::{DocumentGroup, GeneratorWarning, SearchHit, SearchResponse, SearchStats};
