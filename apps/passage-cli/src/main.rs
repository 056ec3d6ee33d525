//! `passage` - build the passage indexes and run hybrid searches against them.
//!
//! ```bash
//! passage index                      # corpus.json -> tantivy + lancedb
//! passage search "boiling water" -n 5
//! passage search "restrant" --mode keyword --fuzzy --json
//! passage status
//! ```

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use passage_core::config::{Config, DataSettings, SearchSettings};
use passage_core::types::{Chunk, Document, FailurePolicy, OrderingPolicy, QuerySyntax, SearchMode};
use passage_core::Corpus;
use passage_embed::default_embedder;
use passage_hybrid::{HybridSearchEngine, SearchRequest};
use passage_text::{TantivyLexicalIndex, TrigramIndex};
use passage_vector::table::{open_db, row_count};
use passage_vector::{LanceChunkWriter, LanceVectorIndex};

const EMBED_BATCH: usize = 32;

#[derive(Parser)]
#[command(name = "passage", version, about = "Hybrid passage retrieval over a local corpus")]
struct Cli {
    /// Directory holding config.toml (default: current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the lexical and vector indexes from the corpus file
    Index(IndexArgs),
    /// Run a query
    Search(SearchArgs),
    /// Show corpus and index status
    Status,
}

#[derive(Args)]
struct IndexArgs {
    /// Corpus JSON file (default: data.corpus_path)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Compute embeddings for chunks that have none
    #[arg(long)]
    embed: bool,

    /// Only build the lexical index
    #[arg(long)]
    skip_vectors: bool,
}

#[derive(Args)]
struct SearchArgs {
    query: String,

    /// vector, keyword or hybrid
    #[arg(long, default_value = "hybrid")]
    mode: SearchMode,

    #[arg(short = 'n', long)]
    limit: Option<usize>,

    #[arg(long)]
    vector_weight: Option<f32>,

    #[arg(long)]
    keyword_weight: Option<f32>,

    /// Add trigram matches for misspelled queries
    #[arg(long)]
    fuzzy: bool,

    /// Minimum trigram similarity for fuzzy matches
    #[arg(long)]
    threshold: Option<f32>,

    #[arg(long)]
    min_score: Option<f32>,

    #[arg(long)]
    rrf_k: Option<f32>,

    /// blended, rrf or weighted
    #[arg(long)]
    ordering: Option<OrderingPolicy>,

    /// Parse the query with the boolean query grammar
    #[arg(long)]
    advanced: bool,

    /// Fail the query when any generator fails
    #[arg(long)]
    strict: bool,

    /// Per-generator deadline
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Group results by document
    #[arg(long)]
    by_document: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    let config = match &cli.config_dir {
        Some(dir) => Config::load_from_dir(dir),
        None => Config::load(),
    }
    .context("loading configuration")?;

    match cli.command {
        Command::Index(args) => index(&config, args).await,
        Command::Search(args) => search(&config, args).await,
        Command::Status => status(&config).await,
    }
}

fn lance_uri(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn index(config: &Config, args: IndexArgs) -> Result<()> {
    let data = config.data()?;
    let settings = config.search()?;
    let corpus_path = args.corpus.unwrap_or_else(|| data.corpus_path.clone());

    println!("Passage indexer\n===============");
    println!("Corpus: {}", corpus_path.display());
    let mut corpus = Corpus::load(&corpus_path)?;
    if args.embed {
        corpus = embed_missing(corpus, settings.embedding_dimension)?;
    }

    let stats = corpus.stats();
    println!("📄 {} documents, {} chunks ({} with embeddings)", stats.documents, stats.chunks, stats.embedded_chunks);
    let report = corpus.integrity_report(settings.embedding_dimension);
    output::print_integrity(&report);

    let lexical = TantivyLexicalIndex::create_in_dir(&data.tantivy_index_dir)?;
    let indexed = lexical.index_corpus(&corpus)?;
    println!("📊 Indexed {} chunks into Tantivy at {}", indexed, data.tantivy_index_dir.display());

    if args.skip_vectors {
        println!("⚠️  Skipping vector index (--skip-vectors)");
    } else {
        std::fs::create_dir_all(&data.lancedb_dir)?;
        let db = open_db(&lance_uri(&data.lancedb_dir)).await?;
        let writer = LanceChunkWriter::new(db, &data.lancedb_table, settings.embedding_dimension);
        let written = writer.write_corpus(&corpus).await?;
        println!("📊 Wrote {} embeddings to LanceDB table '{}'", written, data.lancedb_table);
    }

    println!("\n✅ Indexing completed");
    Ok(())
}

fn embed_missing(corpus: Corpus, dimension: usize) -> Result<Corpus> {
    let documents: Vec<Document> = corpus.documents().cloned().collect();
    let mut chunks: Vec<Chunk> = corpus.chunks().cloned().collect();
    let missing: Vec<usize> = chunks.iter().enumerate().filter(|(_, c)| c.embedding.is_none()).map(|(i, _)| i).collect();
    if missing.is_empty() {
        return Ok(corpus);
    }

    let embedder = default_embedder(dimension)?;
    tracing::info!(chunks = missing.len(), "embedding chunks");
    for batch in missing.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|&i| chunks[i].content.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        for (&i, vector) in batch.iter().zip(vectors) {
            chunks[i].embedding = Some(vector);
        }
    }
    Ok(Corpus::new(documents, chunks)?)
}

fn request(args: &SearchArgs, settings: &SearchSettings) -> SearchRequest {
    let mut req = SearchRequest::from_settings(args.query.clone(), settings).with_mode(args.mode);
    if let Some(limit) = args.limit {
        req = req.with_limit(limit);
    }
    if args.vector_weight.is_some() || args.keyword_weight.is_some() {
        req = req.with_weights(
            args.vector_weight.unwrap_or(settings.vector_weight),
            args.keyword_weight.unwrap_or(settings.keyword_weight),
        );
    }
    if args.fuzzy {
        req = req.with_fuzzy(true);
    }
    if let Some(t) = args.threshold {
        req = req.with_threshold(t);
    }
    if let Some(m) = args.min_score {
        req = req.with_min_score(m);
    }
    if let Some(k) = args.rrf_k {
        req = req.with_rrf_k(k);
    }
    if let Some(o) = args.ordering {
        req = req.with_ordering(o);
    }
    if args.advanced {
        req = req.with_syntax(QuerySyntax::Advanced);
    }
    if args.strict {
        req = req.with_failure_policy(FailurePolicy::Strict);
    }
    if let Some(ms) = args.timeout_ms {
        req = req.with_timeout(Duration::from_millis(ms));
    }
    req
}

async fn search(config: &Config, args: SearchArgs) -> Result<()> {
    let data = config.data()?;
    let settings = config.search()?;
    let request = request(&args, &settings);
    let engine = open_engine(&data, &settings, args.mode != SearchMode::Keyword).await?;

    let response = engine.search(&request).await?;
    let out = match (args.json, args.by_document) {
        (true, false) => serde_json::to_string_pretty(&response)?,
        (true, true) => serde_json::to_string_pretty(&response.group_by_document())?,
        (false, false) => output::format_human(&response),
        (false, true) => output::format_grouped(&response),
    };
    println!("{out}");
    Ok(())
}

async fn open_engine(
    data: &DataSettings,
    settings: &SearchSettings,
    with_embedder: bool,
) -> Result<HybridSearchEngine<LanceVectorIndex, TantivyLexicalIndex, TrigramIndex>> {
    let corpus = Corpus::load(&data.corpus_path)?;
    let lexical = TantivyLexicalIndex::open_in_dir(&data.tantivy_index_dir)
        .with_context(|| format!("opening tantivy index at {} (run `passage index` first)", data.tantivy_index_dir.display()))?
        .with_document_match(settings.document_match);
    let vector = LanceVectorIndex::open(&lance_uri(&data.lancedb_dir), &data.lancedb_table, settings.embedding_dimension).await?;
    let fuzzy = TrigramIndex::from_corpus(&corpus);

    let engine = HybridSearchEngine::new(vector, lexical, fuzzy, Arc::new(corpus), settings.clone())?;
    if !with_embedder {
        return Ok(engine);
    }
    match default_embedder(settings.embedding_dimension) {
        Ok(embedder) => Ok(engine.with_embedder(embedder)),
        Err(e) => {
            tracing::warn!(error = %e, "no query embedder, vector search unavailable");
            Ok(engine)
        }
    }
}

async fn status(config: &Config) -> Result<()> {
    let data = config.data()?;
    let settings = config.search()?;

    println!("Config dir:   {}", config.base_dir().display());
    match Corpus::load(&data.corpus_path) {
        Ok(corpus) => {
            let stats = corpus.stats();
            println!(
                "Corpus:       {} ({} documents, {} chunks, {} embedded)",
                data.corpus_path.display(),
                stats.documents,
                stats.chunks,
                stats.embedded_chunks
            );
            output::print_integrity(&corpus.integrity_report(settings.embedding_dimension));
        }
        Err(e) => println!("Corpus:       {} (unavailable: {e:#})", data.corpus_path.display()),
    }

    match TantivyLexicalIndex::open_in_dir(&data.tantivy_index_dir) {
        Ok(index) => println!("Tantivy:      {} chunks at {}", index.num_chunks(), data.tantivy_index_dir.display()),
        Err(_) => println!("Tantivy:      not built ({})", data.tantivy_index_dir.display()),
    }

    let rows = match open_db(&lance_uri(&data.lancedb_dir)).await {
        Ok(db) => row_count(&db, &data.lancedb_table).await.map_err(anyhow::Error::from),
        Err(e) => Err(e),
    };
    match rows {
        Ok(n) => println!("LanceDB:      {} rows in '{}' at {}", n, data.lancedb_table, data.lancedb_dir.display()),
        Err(e) => println!("LanceDB:      unavailable ({e})"),
    }
    println!("Dimension:    {}", settings.embedding_dimension);
    Ok(())
}
