//! Human-readable rendering of search responses.

use std::fmt::Write;

use passage_core::corpus::IntegrityReport;
use passage_hybrid::{SearchHit, SearchResponse};

fn scores(hit: &SearchHit) -> String {
    let part = |name: &str, s: Option<f32>| s.map(|v| format!("{name}={v:.3}"));
    let parts: Vec<String> = [part("vec", hit.vector_score), part("kw", hit.keyword_score), part("fz", hit.fuzzy_score)]
        .into_iter()
        .flatten()
        .collect();
    format!("score {:.4} | rrf {:.5} | {} ({})", hit.weighted_score, hit.rrf_score, parts.join(" "), hit.score_types.join(","))
}

fn header(out: &mut String, response: &SearchResponse) {
    let _ = writeln!(out, "Search ({}) \"{}\": {} results in {} ms", response.mode, response.query, response.results.len(), response.stats.total_ms);
    for w in &response.warnings {
        let _ = writeln!(out, "⚠️  {} unavailable{}: {}", w.source, if w.timed_out { " (timed out)" } else { "" }, w.message);
    }
}

pub fn format_human(response: &SearchResponse) -> String {
    let mut out = String::new();
    header(&mut out, response);
    if response.is_empty() {
        out.push_str("No results.");
        return out;
    }
    for hit in &response.results {
        let _ = writeln!(out, "\n{}. {} [{}] ({})", hit.rank, hit.title, hit.chunk_id, hit.match_sources);
        let _ = writeln!(out, "   {}", scores(hit));
        if let Some(url) = &hit.public_url {
            let _ = writeln!(out, "   {url}");
        }
        let _ = writeln!(out, "   {}", hit.content.replace('\n', " "));
    }
    out
}

pub fn format_grouped(response: &SearchResponse) -> String {
    let mut out = String::new();
    header(&mut out, response);
    if response.is_empty() {
        out.push_str("No results.");
        return out;
    }
    for group in response.group_by_document() {
        let _ = writeln!(out, "\n📄 {} [{}] best #{} max {:.4}", group.title, group.document_id, group.best_rank, group.max_score);
        for s in &group.snippets {
            let _ = writeln!(out, "   #{} chunk {} ({}) {:.4}: {}", s.rank, s.chunk_index, s.match_sources, s.score, s.content.replace('\n', " "));
        }
    }
    out
}

pub fn print_integrity(report: &IntegrityReport) {
    if report.is_clean() && report.empty_documents.is_empty() {
        println!("✅ Corpus integrity OK");
        return;
    }
    if !report.orphan_chunks.is_empty() {
        println!("⚠️  {} chunks reference missing documents: {}", report.orphan_chunks.len(), report.orphan_chunks.join(", "));
    }
    for (chunk, dim) in &report.dimension_mismatches {
        println!("⚠️  chunk {chunk} has a {dim}-dimensional embedding");
    }
    if !report.empty_documents.is_empty() {
        println!("ℹ️  {} documents have no chunks", report.empty_documents.len());
    }
}
