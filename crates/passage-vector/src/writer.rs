//! Writes embedded corpus chunks into a LanceDB table.
use anyhow::Result;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;

use passage_core::error::Error;
use passage_core::types::Chunk;
use passage_core::Corpus;

use crate::schema::build_arrow_schema;
use crate::table::table_exists;

const BATCH_SIZE: usize = 1000;

pub struct LanceChunkWriter {
	db: Connection,
	table_name: String,
	dimension: usize,
}

impl LanceChunkWriter {
	pub fn new(db: Connection, table_name: &str, dimension: usize) -> Self {
		Self { db, table_name: table_name.to_string(), dimension }
	}

	/// Replaces the table contents with every chunk that carries an embedding.
	/// Chunks without one are skipped. Returns the number of rows written.
	pub async fn write_corpus(&self, corpus: &Corpus) -> Result<usize> {
		let chunks: Vec<&Chunk> = corpus.chunks().filter(|c| c.embedding.is_some()).collect();
		if let Some(bad) = chunks.iter().find(|c| c.embedding.as_ref().map_or(0, Vec::len) != self.dimension) {
			let actual = bad.embedding.as_ref().map_or(0, Vec::len);
			return Err(Error::DimensionMismatch { expected: self.dimension, actual }.into());
		}
		let skipped = corpus.stats().chunks - chunks.len();
		if skipped > 0 { tracing::info!(skipped, "chunks without embeddings are not written"); }

		if table_exists(&self.db, &self.table_name).await? {
			self.db.open_table(&self.table_name).execute().await?.delete("true").await?;
		}
		if chunks.is_empty() { return Ok(0); }

		let pb = ProgressBar::new(chunks.len() as u64);
		if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
			pb.set_style(style.progress_chars("#>-"));
		}
		let mut written = 0usize;
		for batch in chunks.chunks(BATCH_SIZE) {
			self.insert_batch(batch).await?;
			written += batch.len();
			pb.set_position(written as u64);
		}
		pb.finish_with_message("vector table written");
		tracing::info!(rows = written, table = %self.table_name, "lancedb table written");
		Ok(written)
	}

	async fn insert_batch(&self, chunks: &[&Chunk]) -> Result<()> {
		let record_batch = self.to_record_batch(chunks)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if table_exists(&self.db, &self.table_name).await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}

	fn to_record_batch(&self, chunks: &[&Chunk]) -> Result<RecordBatch> {
		let dim = i32::try_from(self.dimension)?;
		let schema = build_arrow_schema(dim);
		let mut ids = Vec::new(); let mut doc_ids = Vec::new(); let mut chunk_indices = Vec::new(); let mut contents = Vec::new();
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for c in chunks {
			ids.push(c.id.clone()); doc_ids.push(c.document_id.clone()); chunk_indices.push(i32::try_from(c.chunk_index)?); contents.push(c.content.clone());
			vectors.push(c.embedding.as_ref().map(|v| v.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(doc_ids)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(StringArray::from(contents)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
		])?;
		Ok(record_batch)
	}
}
