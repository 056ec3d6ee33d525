use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tantivy::{doc, Index, IndexReader, ReloadPolicy};

use passage_core::types::DocumentMatchPolicy;
use passage_core::Corpus;

use crate::tantivy_utils::{chunk_fields, chunk_schema, document_fields, document_schema, register_tokenizer, ChunkFields, DocumentFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Chunk-text and document-metadata indexes searched together as one
/// lexical generator. Cheap to clone.
#[derive(Clone)]
pub struct TantivyLexicalIndex {
	pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
	pub(crate) chunks: Index,
	pub(crate) chunk_reader: IndexReader,
	pub(crate) chunk_fields: ChunkFields,
	pub(crate) documents: Index,
	pub(crate) document_reader: IndexReader,
	pub(crate) document_fields: DocumentFields,
	pub(crate) document_match: DocumentMatchPolicy,
}

impl TantivyLexicalIndex {
	/// Creates empty indexes under `dir/chunks` and `dir/documents`, wiping any previous ones.
	pub fn create_in_dir(dir: &Path) -> Result<Self> {
		let chunk_dir = dir.join("chunks");
		let document_dir = dir.join("documents");
		for d in [&chunk_dir, &document_dir] {
			if d.exists() { std::fs::remove_dir_all(d)?; }
			std::fs::create_dir_all(d)?;
		}
		let chunks = Index::create_in_dir(&chunk_dir, chunk_schema())?;
		let documents = Index::create_in_dir(&document_dir, document_schema())?;
		Self::from_indexes(chunks, documents)
	}

	pub fn create_in_ram() -> Result<Self> {
		Self::from_indexes(Index::create_in_ram(chunk_schema()), Index::create_in_ram(document_schema()))
	}

	pub fn open_in_dir(dir: &Path) -> Result<Self> {
		let chunks = Index::open_in_dir(dir.join("chunks"))
			.map_err(|e| anyhow::anyhow!("Failed to open chunk index in {}: {}", dir.display(), e))?;
		let documents = Index::open_in_dir(dir.join("documents"))
			.map_err(|e| anyhow::anyhow!("Failed to open document index in {}: {}", dir.display(), e))?;
		Self::from_indexes(chunks, documents)
	}

	fn from_indexes(chunks: Index, documents: Index) -> Result<Self> {
		register_tokenizer(&chunks);
		register_tokenizer(&documents);
		let chunk_fields = chunk_fields(&chunks.schema())?;
		let document_fields = document_fields(&documents.schema())?;
		let chunk_reader = chunks.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let document_reader = documents.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self {
			inner: Arc::new(Inner {
				chunks,
				chunk_reader,
				chunk_fields,
				documents,
				document_reader,
				document_fields,
				document_match: DocumentMatchPolicy::default(),
			}),
		})
	}

	/// Must be set before the index is shared.
	pub fn with_document_match(mut self, policy: DocumentMatchPolicy) -> Self {
		match Arc::get_mut(&mut self.inner) {
			Some(inner) => inner.document_match = policy,
			None => tracing::warn!("document match policy ignored: index already shared"),
		}
		self
	}

	pub fn document_match(&self) -> DocumentMatchPolicy {
		self.inner.document_match
	}

	/// Replaces the indexed content with `corpus`. Returns the number of chunks indexed.
	pub fn index_corpus(&self, corpus: &Corpus) -> Result<usize> {
		let inner = &self.inner;
		let cf = inner.chunk_fields;
		let mut chunk_writer = inner.chunks.writer(WRITER_HEAP_BYTES)?;
		chunk_writer.delete_all_documents()?;
		let mut count = 0;
		for c in corpus.chunks() {
			chunk_writer.add_document(doc!(
				cf.chunk_id => c.id.clone(),
				cf.document_id => c.document_id.clone(),
				cf.chunk_index => c.chunk_index as u64,
				cf.text => c.content.clone(),
			))?;
			count += 1;
		}
		chunk_writer.commit()?;

		let df = inner.document_fields;
		let mut document_writer = inner.documents.writer(WRITER_HEAP_BYTES)?;
		document_writer.delete_all_documents()?;
		for d in corpus.documents() {
			document_writer.add_document(doc!(
				df.document_id => d.id.clone(),
				df.metadata => d.metadata_text(),
			))?;
		}
		document_writer.commit()?;

		inner.chunk_reader.reload()?;
		inner.document_reader.reload()?;
		tracing::info!(chunks = count, documents = corpus.documents().count(), "lexical index built");
		Ok(count)
	}

	pub fn num_chunks(&self) -> u64 {
		self.inner.chunk_reader.searcher().num_docs()
	}
}
