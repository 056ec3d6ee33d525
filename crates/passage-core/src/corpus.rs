//! In-memory corpus: documents, chunks and a referential-integrity report.
//!
//! The corpus is produced by an external ingestion pipeline and loaded here from
//! a JSON file of the shape `{ "documents": [...], "chunks": [...] }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::traits::CorpusLookup;
use crate::types::{Chunk, ChunkId, Document, DocumentId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusFile {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: BTreeMap<DocumentId, Document>,
    chunks: BTreeMap<ChunkId, Chunk>,
    by_document: BTreeMap<DocumentId, Vec<ChunkId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedded_chunks: usize,
}

/// Chunks that violate corpus invariants. Nothing here is fatal for search:
/// orphans are dropped at assembly time and mismatched embeddings are never
/// written to the vector index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub orphan_chunks: Vec<ChunkId>,
    pub dimension_mismatches: Vec<(ChunkId, usize)>,
    pub empty_documents: Vec<DocumentId>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_chunks.is_empty() && self.dimension_mismatches.is_empty()
    }
}

impl Corpus {
    pub fn new(documents: Vec<Document>, chunks: Vec<Chunk>) -> Result<Self> {
        let mut corpus = Self::default();
        for doc in documents {
            if corpus.documents.contains_key(&doc.id) {
                return Err(Error::InvalidConfig(format!("duplicate document id '{}'", doc.id)));
            }
            corpus.documents.insert(doc.id.clone(), doc);
        }
        for chunk in chunks {
            if corpus.chunks.contains_key(&chunk.id) {
                return Err(Error::InvalidConfig(format!("duplicate chunk id '{}'", chunk.id)));
            }
            corpus.by_document.entry(chunk.document_id.clone()).or_default().push(chunk.id.clone());
            corpus.chunks.insert(chunk.id.clone(), chunk);
        }
        let chunks = &corpus.chunks;
        for ids in corpus.by_document.values_mut() {
            ids.sort_by(|a, b| {
                let ia = chunks.get(a).map_or(usize::MAX, |c| c.chunk_index);
                let ib = chunks.get(b).map_or(usize::MAX, |c| c.chunk_index);
                ia.cmp(&ib).then_with(|| a.cmp(b))
            });
        }
        Ok(corpus)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CorpusFile = serde_json::from_str(json).map_err(|e| Error::InvalidConfig(format!("corpus json: {e}")))?;
        Self::new(file.documents, file.chunks)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read corpus {}: {}", path.display(), e))?;
        let corpus = Self::from_json_str(&content)?;
        tracing::info!(path = %path.display(), documents = corpus.documents.len(), chunks = corpus.chunks.len(), "loaded corpus");
        Ok(corpus)
    }

    /// Documents ordered by id.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// Chunks ordered by id.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Chunks of one document ordered by `chunk_index`.
    pub fn chunks_of<'a>(&'a self, document_id: &str) -> impl Iterator<Item = &'a Chunk> + 'a {
        self.by_document
            .get(document_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.chunks.get(id))
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            documents: self.documents.len(),
            chunks: self.chunks.len(),
            embedded_chunks: self.chunks.values().filter(|c| c.embedding.is_some()).count(),
        }
    }

    pub fn integrity_report(&self, dimension: usize) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        for chunk in self.chunks.values() {
            if !self.documents.contains_key(&chunk.document_id) {
                report.orphan_chunks.push(chunk.id.clone());
            }
            if let Some(embedding) = &chunk.embedding {
                if embedding.len() != dimension {
                    report.dimension_mismatches.push((chunk.id.clone(), embedding.len()));
                }
            }
        }
        report.empty_documents = self
            .documents
            .keys()
            .filter(|id| !self.by_document.contains_key(*id))
            .cloned()
            .collect();
        report
    }

    /// Fails on the first chunk whose embedding has the wrong length.
    pub fn check_embedding_dimension(&self, dimension: usize) -> Result<()> {
        for chunk in self.chunks.values() {
            if let Some(embedding) = &chunk.embedding {
                if embedding.len() != dimension {
                    return Err(Error::DimensionMismatch { expected: dimension, actual: embedding.len() });
                }
            }
        }
        Ok(())
    }
}

impl CorpusLookup for Corpus {
    fn chunk(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }
}
