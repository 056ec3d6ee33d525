//! passage-vector
//!
//! LanceDB storage for chunk embeddings and the vector candidate generators:
//! `LanceVectorIndex` over a lancedb table and `MemoryVectorIndex` for small
//! corpora held in memory.
pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::MemoryVectorIndex;
pub use search::LanceVectorIndex;
pub use writer::LanceChunkWriter;
