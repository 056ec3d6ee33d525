//! passage-text
//!
//! Lexical (tantivy BM25 over chunk text and document metadata) and fuzzy
//! (trigram similarity) candidate generators.
pub mod tantivy_utils;
pub mod index;
pub mod search;
pub mod trigram;
pub mod fuzzy;

pub use fuzzy::TrigramIndex;
pub use index::TantivyLexicalIndex;
