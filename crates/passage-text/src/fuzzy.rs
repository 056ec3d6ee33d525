use std::collections::HashMap;
use std::sync::Arc;

use passage_core::error::{Error, Result};
use passage_core::ranking::{rank_candidates, ScoredChunk};
use passage_core::traits::FuzzyGenerator;
use passage_core::types::{Candidate, ChunkId, DocumentId, SourceKind};
use passage_core::Corpus;

use crate::trigram::{TrigramQuery, TrigramText};

struct IndexedChunk {
	chunk_id: ChunkId,
	document_id: DocumentId,
	content: TrigramText,
}

struct Inner {
	chunks: Vec<IndexedChunk>,
	titles: HashMap<DocumentId, TrigramText>,
}

/// Typo-tolerant matching of a query against chunk text and document titles.
#[derive(Clone)]
pub struct TrigramIndex {
	inner: Arc<Inner>,
}

impl TrigramIndex {
	pub fn from_corpus(corpus: &Corpus) -> Self {
		let chunks = corpus
			.chunks()
			.map(|c| IndexedChunk { chunk_id: c.id.clone(), document_id: c.document_id.clone(), content: TrigramText::new(&c.content) })
			.collect::<Vec<_>>();
		let titles = corpus.documents().map(|d| (d.id.clone(), TrigramText::new(&d.title))).collect();
		tracing::debug!(chunks = chunks.len(), "trigram index built");
		Self { inner: Arc::new(Inner { chunks, titles }) }
	}

	pub fn len(&self) -> usize {
		self.inner.chunks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.chunks.is_empty()
	}
}

impl Inner {
	fn search_blocking(&self, query: &str, threshold: f32, pool: usize) -> Vec<Candidate> {
		let query = TrigramQuery::new(query);
		if query.is_empty() || pool == 0 { return Vec::new(); }

		let mut title_scores: HashMap<&str, f32> = HashMap::new();
		let mut scored = Vec::new();
		for chunk in &self.chunks {
			let title = *title_scores.entry(chunk.document_id.as_str()).or_insert_with(|| {
				self.titles.get(&chunk.document_id).map_or(0.0, |t| t.best_window_similarity(&query))
			});
			let raw = chunk.content.best_window_similarity(&query).max(title);
			if raw > 0.0 && raw >= threshold {
				scored.push(ScoredChunk::new(chunk.chunk_id.clone(), chunk.document_id.clone(), raw));
			}
		}
		tracing::debug!(matches = scored.len(), threshold, "fuzzy search");
		rank_candidates(scored, SourceKind::Fuzzy, pool)
	}
}

impl FuzzyGenerator for TrigramIndex {
	async fn search(&self, query: &str, threshold: f32, pool: usize) -> Result<Vec<Candidate>> {
		if !(0.0..=1.0).contains(&threshold) {
			return Err(Error::InvalidThreshold(threshold));
		}
		let inner = self.inner.clone();
		let query = query.to_string();
		tokio::task::spawn_blocking(move || inner.search_blocking(&query, threshold, pool))
			.await
			.map_err(|e| Error::unavailable(SourceKind::Fuzzy, e))
	}
}
