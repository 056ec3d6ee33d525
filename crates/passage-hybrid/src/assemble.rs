use std::collections::HashSet;

use passage_core::traits::CorpusLookup;
use passage_core::types::FusedResult;

use crate::response::SearchHit;

/// First `max_chars` characters of `text`, with `...` appended when cut.
/// `max_chars == 0` keeps the whole text.
pub fn snippet(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return text.to_string();
    }
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => format!("{}...", &text[..byte]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembled {
    pub hits: Vec<SearchHit>,
    /// Results whose chunk or document could not be resolved.
    pub dropped: usize,
}

pub struct ResultAssembler {
    snippet_chars: usize,
}

impl ResultAssembler {
    pub fn new(snippet_chars: usize) -> Self {
        Self { snippet_chars }
    }

    /// Resolves fused results in order until `limit` hits are built. Results that
    /// reference a missing chunk or document are skipped with a warning and the
    /// next result takes their place. Ranks in the output are contiguous from 1.
    pub fn assemble(&self, fused: Vec<FusedResult>, limit: usize, lookup: &dyn CorpusLookup) -> Assembled {
        let mut out = Assembled::default();
        let mut seen = HashSet::new();
        for r in fused {
            if out.hits.len() >= limit {
                break;
            }
            if !seen.insert(r.chunk_id.clone()) {
                continue;
            }
            let Some(chunk) = lookup.chunk(&r.chunk_id) else {
                tracing::warn!(chunk = %r.chunk_id, "dropping result: chunk not found");
                out.dropped += 1;
                continue;
            };
            let Some(doc) = lookup.document(&chunk.document_id) else {
                tracing::warn!(chunk = %r.chunk_id, document = %chunk.document_id, "dropping result: document not found");
                out.dropped += 1;
                continue;
            };
            let match_sources = r.match_sources();
            let score_types = r.sources.iter().map(|s| s.score_type()).collect();
            out.hits.push(SearchHit {
                rank: out.hits.len() + 1,
                chunk_id: r.chunk_id,
                document_id: doc.id.clone(),
                chunk_index: chunk.chunk_index,
                content: snippet(&chunk.content, self.snippet_chars),
                title: doc.title.clone(),
                category: doc.category.clone(),
                tags: doc.tags.clone(),
                original_filename: doc.original_filename.clone(),
                public_url: doc.public_url.clone(),
                vector_score: r.vector_score,
                keyword_score: r.keyword_score,
                fuzzy_score: r.fuzzy_score,
                weighted_score: r.weighted_score,
                rrf_score: r.rrf_score,
                fused_score: r.fused_score,
                sources: r.sources,
                score_types,
                match_sources,
            });
        }
        out
    }
}
