use std::collections::HashMap;
use tantivy::collector::{DocSetCollector, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{Searcher, TantivyDocument, Term};

use passage_core::error::{Error, Result};
use passage_core::ranking::{rank_candidates, ScoredChunk};
use passage_core::traits::LexicalGenerator;
use passage_core::types::{Candidate, ChunkId, DocumentId, DocumentMatchPolicy, QuerySyntax, SourceKind};

use crate::index::{Inner, TantivyLexicalIndex};
use crate::tantivy_utils::analyze;

fn backend(e: impl std::fmt::Display) -> Error {
	Error::unavailable(SourceKind::Keyword, e)
}

fn terms_query(field: Field, terms: &[String]) -> Box<dyn Query> {
	Box::new(BooleanQuery::new(
		terms
			.iter()
			.map(|t| {
				let q = TermQuery::new(Term::from_field_text(field, t), IndexRecordOption::WithFreqs);
				(Occur::Should, Box::new(q) as Box<dyn Query>)
			})
			.collect(),
	))
}

impl LexicalGenerator for TantivyLexicalIndex {
	async fn search(&self, query: &str, syntax: QuerySyntax, pool: usize) -> Result<Vec<Candidate>> {
		let inner = self.inner.clone();
		let query = query.to_string();
		tokio::task::spawn_blocking(move || inner.search_blocking(&query, syntax, pool))
			.await
			.map_err(backend)?
	}
}

impl Inner {
	fn queries(&self, query: &str, syntax: QuerySyntax) -> Result<Option<(Box<dyn Query>, Box<dyn Query>)>> {
		match syntax {
			QuerySyntax::Plain => {
				let terms = analyze(query);
				if terms.is_empty() { return Ok(None); }
				Ok(Some((terms_query(self.chunk_fields.text, &terms), terms_query(self.document_fields.metadata, &terms))))
			}
			QuerySyntax::Advanced => {
				let parse = |index: &tantivy::Index, field: Field| {
					QueryParser::for_index(index, vec![field])
						.parse_query(query)
						.map_err(|e| Error::InvalidQuerySyntax(e.to_string()))
				};
				let chunk_q = parse(&self.chunks, self.chunk_fields.text)?;
				let doc_q = parse(&self.documents, self.document_fields.metadata)?;
				Ok(Some((chunk_q, doc_q)))
			}
		}
	}

	pub(crate) fn search_blocking(&self, query: &str, syntax: QuerySyntax, pool: usize) -> Result<Vec<Candidate>> {
		if pool == 0 || query.trim().is_empty() { return Ok(Vec::new()); }
		let Some((chunk_q, doc_q)) = self.queries(query, syntax)? else {
			tracing::debug!(query, "query has no searchable terms");
			return Ok(Vec::new());
		};

		let chunk_searcher = self.chunk_reader.searcher();
		let cf = self.chunk_fields;
		let mut direct: HashMap<ChunkId, (DocumentId, f32)> = HashMap::new();
		for (score, addr) in chunk_searcher.search(&*chunk_q, &TopDocs::with_limit(pool)).map_err(backend)? {
			let doc: TantivyDocument = chunk_searcher.doc(addr).map_err(backend)?;
			let (Some(id), Some(doc_id)) = (str_field(&doc, cf.chunk_id), str_field(&doc, cf.document_id)) else { continue };
			direct.entry(id).or_insert((doc_id, score));
		}

		let doc_searcher = self.document_reader.searcher();
		let mut merged = direct.clone();
		let mut document_hits = 0usize;
		for (score, addr) in doc_searcher.search(&*doc_q, &TopDocs::with_limit(pool)).map_err(backend)? {
			let doc: TantivyDocument = doc_searcher.doc(addr).map_err(backend)?;
			let Some(doc_id) = str_field(&doc, self.document_fields.document_id) else { continue };
			document_hits += 1;
			for chunk_id in self.attached_chunks(&chunk_searcher, &doc_id, &direct)? {
				let entry = merged.entry(chunk_id).or_insert((doc_id.clone(), score));
				entry.1 = entry.1.max(score);
			}
		}
		tracing::debug!(chunk_hits = direct.len(), document_hits, merged = merged.len(), "lexical search");

		let scored = merged.into_iter().map(|(id, (doc_id, score))| ScoredChunk::new(id, doc_id, score)).collect();
		Ok(rank_candidates(scored, SourceKind::Keyword, pool))
	}

	/// Chunks that receive a document-level metadata match.
	fn attached_chunks(&self, searcher: &Searcher, doc_id: &str, direct: &HashMap<ChunkId, (DocumentId, f32)>) -> Result<Vec<ChunkId>> {
		if self.document_match == DocumentMatchPolicy::Representative {
			let best = direct
				.iter()
				.filter(|(_, (d, _))| d == doc_id)
				.max_by(|a, b| a.1 .1.total_cmp(&b.1 .1).then_with(|| b.0.cmp(a.0)))
				.map(|(id, _)| id.clone());
			if let Some(id) = best { return Ok(vec![id]); }
		}

		let cf = self.chunk_fields;
		let by_doc = TermQuery::new(Term::from_field_text(cf.document_id, doc_id), IndexRecordOption::Basic);
		let mut chunks: Vec<(u64, ChunkId)> = Vec::new();
		for addr in searcher.search(&by_doc, &DocSetCollector).map_err(backend)? {
			let doc: TantivyDocument = searcher.doc(addr).map_err(backend)?;
			let Some(id) = str_field(&doc, cf.chunk_id) else { continue };
			let index = doc.get_first(cf.chunk_index).and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
			chunks.push((index, id));
		}
		chunks.sort();
		match self.document_match {
			DocumentMatchPolicy::Representative => Ok(chunks.into_iter().take(1).map(|(_, id)| id).collect()),
			DocumentMatchPolicy::AllChunks => Ok(chunks.into_iter().map(|(_, id)| id).collect()),
		}
	}
}

fn str_field(doc: &TantivyDocument, field: Field) -> Option<String> {
	doc.get_first(field).and_then(|v| v.as_str()).map(str::to_string)
}
