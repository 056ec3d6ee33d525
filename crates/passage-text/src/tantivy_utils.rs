//! Schemas and the shared English analyzer for the chunk and document indexes.
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, INDEXED, STORED, STRING};
use tantivy::tokenizer::{Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter, TextAnalyzer, TokenStream};
use tantivy::Index;

pub const ANALYZER: &str = "passage_en";

const STOP_WORDS: &[&str] = &[
	"a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
];

#[derive(Debug, Clone, Copy)]
pub struct ChunkFields {
	pub chunk_id: Field,
	pub document_id: Field,
	pub chunk_index: Field,
	pub text: Field,
}

#[derive(Debug, Clone, Copy)]
pub struct DocumentFields {
	pub document_id: Field,
	pub metadata: Field,
}

fn analyzed_text() -> TextOptions {
	let indexing = TextFieldIndexing::default().set_tokenizer(ANALYZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	TextOptions::default().set_indexing_options(indexing).set_stored()
}

pub fn chunk_schema() -> Schema {
	let mut builder = Schema::builder();
	builder.add_text_field("chunk_id", STRING | STORED);
	builder.add_text_field("document_id", STRING | STORED);
	builder.add_u64_field("chunk_index", INDEXED | STORED);
	builder.add_text_field("text", analyzed_text());
	builder.build()
}

pub fn document_schema() -> Schema {
	let mut builder = Schema::builder();
	builder.add_text_field("document_id", STRING | STORED);
	builder.add_text_field("metadata", analyzed_text());
	builder.build()
}

pub fn chunk_fields(schema: &Schema) -> tantivy::Result<ChunkFields> {
	Ok(ChunkFields {
		chunk_id: schema.get_field("chunk_id")?,
		document_id: schema.get_field("document_id")?,
		chunk_index: schema.get_field("chunk_index")?,
		text: schema.get_field("text")?,
	})
}

pub fn document_fields(schema: &Schema) -> tantivy::Result<DocumentFields> {
	Ok(DocumentFields { document_id: schema.get_field("document_id")?, metadata: schema.get_field("metadata")? })
}

/// Simple tokenizer, long-token removal, lowercasing, stopwords, English stemming.
pub fn build_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(RemoveLongFilter::limit(40))
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.filter(Stemmer::new(Language::English))
		.build()
}

pub fn register_tokenizer(index: &Index) {
	index.tokenizers().register(ANALYZER, build_analyzer());
}

/// Terms the index would store for `text`, in order, duplicates removed.
pub fn analyze(text: &str) -> Vec<String> {
	let mut analyzer = build_analyzer();
	let mut stream = analyzer.token_stream(text);
	let mut terms: Vec<String> = Vec::new();
	stream.process(&mut |token| {
		if !terms.contains(&token.text) {
			terms.push(token.text.clone());
		}
	});
	terms
}
