//! pdfrag-rs CLI application
//!
//! Command-line interface for the pdfrag-rs library.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfrag_rs::api::{
    IngestionPipeline, PdfExtractor, Retriever, embed_in_batches, validate_embeddings, write_outlines,
};
use pdfrag_rs::config::{Config, DistanceMetric};
use pdfrag_rs::storage::{
    FieldMatch, IngestStats, PayloadFilter, QdrantIndex, read_records, write_records,
};
use pdfrag_rs::utils::{ensure_directory, list_files_with_extension, list_pdfs, output_path};
use pdfrag_rs::{EmbeddingClient, LopdfReader, OllamaEmbedder};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pdfrag-rs")]
#[command(about = "Structure-aware PDF chunking and vector-index ingestion for semantic retrieval")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the config file
#[derive(Args)]
struct Settings {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long, global = true)]
    max_chars: Option<usize>,

    /// Characters carried over between adjacent chunks
    #[arg(long, global = true)]
    overlap: Option<usize>,

    /// Minimum heading score
    #[arg(long, global = true)]
    min_score: Option<f32>,

    /// Embedding service base URL
    #[arg(long, global = true)]
    embed_url: Option<String>,

    /// Embedding model
    #[arg(long, global = true)]
    model: Option<String>,

    /// Vector index URL
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    /// Vector index API key
    #[arg(long, global = true, env = "QDRANT_API_KEY")]
    api_key: Option<String>,

    /// Destination collection
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Distance metric for a new collection (cosine, euclid, dot, manhattan)
    #[arg(long, global = true)]
    distance: Option<DistanceMetric>,

    /// Drop and recreate the collection before writing
    #[arg(long, global = true)]
    recreate: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk every PDF in a directory into JSONL files
    Extract {
        /// Directory containing PDFs
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for *.jsonl files
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// Chunk and embed every PDF, writing JSONL files with embeddings
    Embed {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// Upsert embedded JSONL files into the vector index
    Upload {
        /// Directory containing *.jsonl files
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Chunk, embed and upsert every PDF in one pass
    Ingest {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write heading outlines for every PDF
    Outline {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// Search the vector index
    Search {
        /// Search query
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Payload filter, `key=value`; repeatable
        #[arg(short, long)]
        filter: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli.settings)?;

    match cli.command {
        Commands::Extract { input, output } => extract_command(&config, input, output),
        Commands::Embed { input, output } => embed_command(&config, input, output).await,
        Commands::Upload { input } => upload_command(&config, input).await,
        Commands::Ingest { input } => ingest_command(&config, input).await,
        Commands::Outline { input, output } => outline_command(&config, input, output),
        Commands::Search {
            query,
            top_k,
            filter,
        } => search_command(&config, query, top_k, filter).await,
    }
}

fn load_config(settings: &Settings) -> Result<Config> {
    let mut config = match &settings.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(max_chars) = settings.max_chars {
        config.chunking.max_chars = max_chars;
    }
    if let Some(overlap) = settings.overlap {
        config.chunking.overlap_chars = overlap;
    }
    if let Some(min_score) = settings.min_score {
        config.headings.min_score = min_score;
    }
    if let Some(url) = &settings.embed_url {
        config.embedding.endpoint = url.clone();
    }
    if let Some(model) = &settings.model {
        config.embedding.model = model.clone();
    }
    if let Some(url) = &settings.qdrant_url {
        config.index.url = url.clone();
    }
    if let Some(key) = &settings.api_key {
        config.index.api_key = Some(key.clone());
    }
    if let Some(collection) = &settings.collection {
        config.index.collection = collection.clone();
    }
    if let Some(distance) = settings.distance {
        config.index.distance = distance;
    }
    config.index.recreate |= settings.recreate;

    config.validate()?;
    Ok(config)
}

fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template(&format!(
            "{{spinner}} [{{elapsed_precise}}] {{bar:40}} {{pos}}/{{len}} {} {{msg}}",
            unit
        ))?,
    );
    Ok(bar)
}

fn print_stats(stats: &IngestStats) {
    println!("   📄 Documents: {}", stats.documents);
    println!("   📊 Chunks: {}", stats.chunks);
    println!("   📦 Batches: {}", stats.batches);
    if stats.skipped > 0 {
        println!("   ⚠️  Skipped: {}", stats.skipped);
    }
    println!("   ⏱️  Time: {:.2}s", stats.elapsed_secs);
}

fn extract_command(config: &Config, input: PathBuf, output: PathBuf) -> Result<()> {
    let pdfs = list_pdfs(&input)?;
    println!("📄 Extracting {} PDFs from {}", pdfs.len(), input.display());

    let started = Instant::now();
    let extractor = PdfExtractor::new(LopdfReader::new(), config)?;
    let report = extractor.extract_to_dir(&pdfs, &output)?;

    for (path, reason) in &report.failures {
        eprintln!("❌ {}: {}", path.display(), reason);
    }
    println!("✅ Extraction complete!");
    print_stats(&IngestStats {
        documents: report.documents.len(),
        chunks: report.chunk_count(),
        batches: 0,
        skipped: report.failures.len(),
        elapsed_secs: started.elapsed().as_secs_f64(),
    });
    println!("   📋 Output: {}", output.display());
    Ok(())
}

async fn embed_command(config: &Config, input: PathBuf, output: PathBuf) -> Result<()> {
    let pdfs = list_pdfs(&input)?;
    ensure_directory(&output)?;
    let started = Instant::now();

    let extractor = PdfExtractor::new(LopdfReader::new(), config)?;
    let embedder = OllamaEmbedder::new(&config.embedding)?;
    let report = extractor.extract_all(&pdfs);

    let bar = progress_bar(report.documents.len(), "documents")?;
    let mut stats = IngestStats {
        skipped: report.failures.len(),
        ..Default::default()
    };
    for doc in report.documents {
        bar.set_message(doc.source_file.clone());
        let count = doc.chunks.len();
        let embedded = embed_in_batches(&embedder, doc.chunks, config.embedding.batch_size)
            .await
            .with_context(|| format!("embedding {}", doc.source_file))?;
        write_records(output_path(&output, &doc.path, ".jsonl"), &embedded)?;

        stats.documents += 1;
        stats.chunks += count;
        stats.batches += count.div_ceil(config.embedding.batch_size);
        bar.inc(1);
    }
    bar.finish_and_clear();
    stats.elapsed_secs = started.elapsed().as_secs_f64();

    println!("✅ Embedding complete ({})", embedder.model());
    print_stats(&stats);
    Ok(())
}

async fn upload_command(config: &Config, input: PathBuf) -> Result<()> {
    let files = list_files_with_extension(&input, "jsonl")?;
    if files.is_empty() {
        bail!("no *.jsonl files found in {}", input.display());
    }
    let started = Instant::now();

    // Read and validate everything before the first write.
    let mut batches = Vec::with_capacity(files.len());
    for file in &files {
        let records = read_records(file)?;
        batches.push((file, records));
    }
    let all: Vec<_> = batches.iter().flat_map(|(_, r)| r.iter().cloned()).collect();
    validate_embeddings(&all)?;
    drop(all);

    let embedder = OllamaEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let mut pipeline = IngestionPipeline::new(embedder, index, config);

    let bar = progress_bar(batches.len(), "files")?;
    for (file, records) in &batches {
        bar.set_message(file.display().to_string());
        pipeline
            .upload_records(records)
            .await
            .with_context(|| format!("uploading {}", file.display()))?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    let mut stats = pipeline.stats().clone();
    stats.documents = batches.len();
    stats.elapsed_secs = started.elapsed().as_secs_f64();
    println!("✅ Upload to {} complete!", pipeline.collection());
    print_stats(&stats);
    Ok(())
}

async fn ingest_command(config: &Config, input: PathBuf) -> Result<()> {
    let pdfs = list_pdfs(&input)?;
    let started = Instant::now();

    let extractor = PdfExtractor::new(LopdfReader::new(), config)?;
    let embedder = OllamaEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let mut pipeline = IngestionPipeline::new(embedder, index, config);

    let report = extractor.extract_all(&pdfs);
    let skipped = report.failures.len();

    let bar = progress_bar(report.documents.len(), "documents")?;
    for doc in report.documents {
        bar.set_message(doc.source_file.clone());
        let name = doc.source_file.clone();
        pipeline
            .ingest_documents(vec![doc])
            .await
            .with_context(|| format!("ingesting {}", name))?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    let mut stats = pipeline.stats().clone();
    stats.skipped = skipped;
    stats.elapsed_secs = started.elapsed().as_secs_f64();
    println!("✅ Ingestion into {} complete!", pipeline.collection());
    print_stats(&stats);
    Ok(())
}

fn outline_command(config: &Config, input: PathBuf, output: PathBuf) -> Result<()> {
    let pdfs = list_pdfs(&input)?;
    let extractor = PdfExtractor::new(LopdfReader::new(), config)?;
    let report = write_outlines(&extractor, &pdfs, &output, config.headings.min_score)?;

    for (path, reason) in &report.failures {
        eprintln!("❌ {}: {}", path.display(), reason);
    }
    println!(
        "✅ Wrote outlines for {} PDFs ({} headings) to {}",
        report.documents,
        report.headings,
        output.display()
    );
    Ok(())
}

async fn search_command(config: &Config, query: String, top_k: usize, filter: Vec<String>) -> Result<()> {
    let must = filter
        .iter()
        .map(|expr| {
            FieldMatch::parse(expr).with_context(|| format!("invalid filter {:?}, expected key=value", expr))
        })
        .collect::<Result<Vec<_>>>()?;
    let filter = (!must.is_empty()).then_some(PayloadFilter { must });

    let embedder = OllamaEmbedder::new(&config.embedding)?;
    let index = QdrantIndex::new(&config.index)?;
    let retriever = Retriever::new(&embedder, &index, config.index.collection.clone());

    println!("🔍 Searching for: \"{}\"", query);
    let results = retriever.search(&query, top_k, filter).await?;
    if results.is_empty() {
        println!("❌ No results found");
        return Ok(());
    }

    println!("📋 Found {} results:", results.len());
    println!();
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. Score: {:.3}  {} p.{}",
            i + 1,
            result.score,
            result.source_file.as_deref().unwrap_or("?"),
            result.page.map_or_else(|| "?".to_string(), |p| p.to_string())
        );
        if let Some(section) = &result.section_path {
            println!("   § {}", section);
        }
        println!("   {}", result.text);
        println!();
    }
    Ok(())
}
