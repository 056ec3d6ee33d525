//! Shared domain types, error taxonomy, generator traits and configuration
//! for the passage retrieval engine.
//!
//! Configuration uses Figment to merge `config.toml` + `config.<env>.toml` +
//! `APP_*` env vars, with helpers to expand `~` and `${VAR}` in paths.

pub mod config;
pub mod corpus;
pub mod error;
pub mod ranking;
pub mod traits;
pub mod types;

pub use corpus::Corpus;
pub use error::{Error, ErrorKind, Result};
pub use types::{Candidate, Chunk, Document, FusedResult, SearchMode, SourceKind};
