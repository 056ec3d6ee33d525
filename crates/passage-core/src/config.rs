use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::{DocumentMatchPolicy, FailurePolicy, OrderingPolicy};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_dir(Path::new("."))
    }

    /// Merges `config.toml`, `config.<env>.toml` and `APP_*` variables.
    /// Nested keys use `__`, e.g. `APP_SEARCH__RRF_K=30`.
    pub fn load_from_dir(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir: dir.to_path_buf() })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `[data]` with every path expanded and resolved against the config directory.
    pub fn data(&self) -> anyhow::Result<DataSettings> {
        let raw: DataSettings = if self.figment.contains("data") { self.get("data")? } else { DataSettings::default() };
        Ok(raw.resolved(&self.base_dir))
    }

    /// `[search]`, defaulted when absent, validated.
    pub fn search(&self) -> anyhow::Result<SearchSettings> {
        let settings: SearchSettings =
            if self.figment.contains("search") { self.get("search")? } else { SearchSettings::default() };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSettings {
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    #[serde(default = "default_tantivy_index_dir")]
    pub tantivy_index_dir: PathBuf,
    #[serde(default = "default_lancedb_dir")]
    pub lancedb_dir: PathBuf,
    #[serde(default = "default_lancedb_table")]
    pub lancedb_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_path: default_corpus_path(),
            tantivy_index_dir: default_tantivy_index_dir(),
            lancedb_dir: default_lancedb_dir(),
            lancedb_table: default_lancedb_table(),
        }
    }
}

impl DataSettings {
    fn resolved(self, base: &Path) -> Self {
        Self {
            corpus_path: resolve_with_base(base, self.corpus_path.to_string_lossy()),
            tantivy_index_dir: resolve_with_base(base, self.tantivy_index_dir.to_string_lossy()),
            lancedb_dir: resolve_with_base(base, self.lancedb_dir.to_string_lossy()),
            lancedb_table: self.lancedb_table,
        }
    }
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.json")
}
fn default_tantivy_index_dir() -> PathBuf {
    PathBuf::from(".passage/tantivy")
}
fn default_lancedb_dir() -> PathBuf {
    PathBuf::from(".passage/lancedb")
}
fn default_lancedb_table() -> String {
    "chunks".to_string()
}

/// Tunables for query handling. Every field has a default so a partial
/// `[search]` table is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,
    #[serde(default)]
    pub fuzzy_enabled: bool,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default)]
    pub min_score: f32,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    #[serde(default)]
    pub ordering: OrderingPolicy,
    #[serde(default = "default_rrf_scale")]
    pub rrf_scale: f32,
    /// Multiplier applied to raw lexical scores before clamping to 1.0.
    #[serde(default = "default_lexical_calibration")]
    pub lexical_calibration: f32,
    #[serde(default = "default_candidate_pool_multiplier")]
    pub candidate_pool_multiplier: usize,
    #[serde(default = "default_min_candidate_pool")]
    pub min_candidate_pool: usize,
    #[serde(default = "default_generator_timeout_ms")]
    pub generator_timeout_ms: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// 0 keeps the full chunk text.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default)]
    pub document_match: DocumentMatchPolicy,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

fn default_limit() -> usize {
    10
}
fn default_max_limit() -> usize {
    100
}
fn default_vector_weight() -> f32 {
    0.7
}
fn default_keyword_weight() -> f32 {
    0.3
}
fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_rrf_k() -> f32 {
    60.0
}
fn default_rrf_scale() -> f32 {
    1000.0
}
fn default_lexical_calibration() -> f32 {
    10.0
}
fn default_candidate_pool_multiplier() -> usize {
    3
}
fn default_min_candidate_pool() -> usize {
    20
}
fn default_generator_timeout_ms() -> u64 {
    5000
}
fn default_snippet_chars() -> usize {
    200
}
fn default_embedding_dimension() -> usize {
    1024
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            fuzzy_enabled: false,
            similarity_threshold: default_similarity_threshold(),
            min_score: 0.0,
            rrf_k: default_rrf_k(),
            ordering: OrderingPolicy::default(),
            rrf_scale: default_rrf_scale(),
            lexical_calibration: default_lexical_calibration(),
            candidate_pool_multiplier: default_candidate_pool_multiplier(),
            min_candidate_pool: default_min_candidate_pool(),
            generator_timeout_ms: default_generator_timeout_ms(),
            failure_policy: FailurePolicy::default(),
            snippet_chars: default_snippet_chars(),
            document_match: DocumentMatchPolicy::default(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.max_limit == 0 {
            return invalid("search.max_limit must be at least 1".into());
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return invalid(format!("search.default_limit must be in 1..={}", self.max_limit));
        }
        for (name, w) in [("vector_weight", self.vector_weight), ("keyword_weight", self.keyword_weight)] {
            if !w.is_finite() || w < 0.0 {
                return invalid(format!("search.{name} must be a non-negative number, got {w}"));
            }
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return invalid(format!("search.similarity_threshold {} is outside [0, 1]", self.similarity_threshold));
        }
        if !self.min_score.is_finite() {
            return invalid("search.min_score must be finite".into());
        }
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return invalid(format!("search.rrf_k must be positive, got {}", self.rrf_k));
        }
        if !self.rrf_scale.is_finite() || self.rrf_scale < 0.0 {
            return invalid(format!("search.rrf_scale must be non-negative, got {}", self.rrf_scale));
        }
        if !self.lexical_calibration.is_finite() || self.lexical_calibration <= 0.0 {
            return invalid(format!("search.lexical_calibration must be positive, got {}", self.lexical_calibration));
        }
        if self.candidate_pool_multiplier == 0 {
            return invalid("search.candidate_pool_multiplier must be at least 1".into());
        }
        if self.generator_timeout_ms == 0 {
            return invalid("search.generator_timeout_ms must be at least 1".into());
        }
        if self.embedding_dimension == 0 {
            return invalid("search.embedding_dimension must be at least 1".into());
        }
        Ok(())
    }

    /// Candidates requested from each generator for a result limit.
    pub fn candidate_pool(&self, limit: usize) -> usize {
        limit.saturating_mul(self.candidate_pool_multiplier).max(self.min_candidate_pool).max(limit)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against `base` after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
