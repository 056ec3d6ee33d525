use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};

use passage_core::error::{Error, Result};
use passage_core::ranking::{rank_candidates, ScoredChunk};
use passage_core::traits::VectorGenerator;
use passage_core::types::{Candidate, SourceKind};

use crate::table::{open_db, table_exists};

fn backend(e: impl std::fmt::Display) -> Error {
	Error::unavailable(SourceKind::Vector, e)
}

/// Cosine nearest-neighbour search over a LanceDB chunk table.
pub struct LanceVectorIndex {
	db: Connection,
	table_name: String,
	dimension: usize,
}

impl LanceVectorIndex {
	pub fn new(db: Connection, table_name: &str, dimension: usize) -> Self {
		Self { db, table_name: table_name.to_string(), dimension }
	}

	pub async fn open(uri: &str, table_name: &str, dimension: usize) -> anyhow::Result<Self> {
		Ok(Self::new(open_db(uri).await?, table_name, dimension))
	}

	async fn query(&self, query: &[f32], pool: usize) -> Result<Vec<ScoredChunk>> {
		if !table_exists(&self.db, &self.table_name).await.map_err(backend)? {
			tracing::debug!(table = %self.table_name, "vector table missing");
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await.map_err(backend)?;
		if table.count_rows(None).await.map_err(backend)? == 0 { return Ok(Vec::new()); }
		let mut stream = table
			.vector_search(query.to_vec())
			.map_err(backend)?
			.distance_type(DistanceType::Cosine)
			.limit(pool)
			.execute()
			.await
			.map_err(backend)?;
		let mut scored = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(backend)? {
			read_batch(&batch, &mut scored).map_err(backend)?;
		}
		Ok(scored)
	}
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> std::result::Result<&'a T, String> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| format!("column '{name}' missing or mistyped"))
}

fn read_batch(batch: &RecordBatch, out: &mut Vec<ScoredChunk>) -> std::result::Result<(), String> {
	let ids = column::<StringArray>(batch, "chunk_id")?;
	let doc_ids = column::<StringArray>(batch, "document_id")?;
	let distances = column::<Float32Array>(batch, "_distance")?;
	for i in 0..batch.num_rows() {
		if distances.is_null(i) { continue; }
		let raw = (1.0 - distances.value(i)).clamp(0.0, 1.0);
		out.push(ScoredChunk::new(ids.value(i), doc_ids.value(i), raw));
	}
	Ok(())
}

impl VectorGenerator for LanceVectorIndex {
	fn dimension(&self) -> usize {
		self.dimension
	}

	async fn nearest(&self, query: &[f32], pool: usize) -> Result<Vec<Candidate>> {
		if query.len() != self.dimension {
			return Err(Error::DimensionMismatch { expected: self.dimension, actual: query.len() });
		}
		if pool == 0 { return Ok(Vec::new()); }
		let scored = self.query(query, pool).await?;
		tracing::debug!(candidates = scored.len(), "vector search");
		Ok(rank_candidates(scored, SourceKind::Vector, pool))
	}
}
