//! # mmrag CLI
//!
//! Command-line interface for mmrag, a multimodal retrieval store.
//!
//! Text files, images and PDFs are ingested into two vector collections
//! (text and image). Queries search both and return one ranked list with
//! source attribution.
//!
//! ## Commands
//!
//! - `mmrag ingest <FILE>...` - Ingest files
//! - `mmrag query <TEXT>` - Search ingested content
//! - `mmrag status` - Show collection statistics
//! - `mmrag config <show|init|path>` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! mmrag ingest notes.txt diagram.png report.pdf
//! mmrag query "What is machine learning?" --top-k 3
//! mmrag query "quarterly revenue" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mmrag_core::{QueryResult, ResultContent, Upload, VectorStore};
use mmrag_embed::{EmbeddingProvider, HashEmbedder};
use mmrag_extract::{Extractors, OcrConfig, PdfiumRenderer};
use mmrag_ingest::{IngestionPipeline, LocalFileStore};
use mmrag_query::RetrievalEngine;
use mmrag_store::LanceStore;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

mod config;
mod index;

use config::{Config, EmbeddingBackend, LoggingConfig};
use index::IndexModels;

/// Dimensions used by the `hash` backend.
const HASH_TEXT_DIM: usize = 384;
const HASH_IMAGE_DIM: usize = 512;

#[derive(Parser)]
#[command(name = "mmrag")]
#[command(about = "Multimodal ingestion and retrieval for text, images and PDFs")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/mmrag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one or more files
    Ingest {
        /// Files to ingest
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Declared MIME type (default: detect from extension)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Query both collections
    Query {
        /// Query text
        query: String,

        /// Maximum results (default: query.default_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Show collection statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for one ingested file.
#[derive(Serialize)]
struct IngestOutput {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<mmrag_core::IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    data_dir: String,
    text_model: String,
    image_model: String,
    text_records: u64,
    image_records: u64,
    documents: u64,
}

/// Everything a command may need, built from the configuration.
struct Components {
    store: Arc<LanceStore>,
    embedder: EmbeddingProvider,
    data_dir: PathBuf,
}

fn build_embedder(config: &Config, data_dir: &Path) -> Result<EmbeddingProvider> {
    let provider = match config.embedding.backend {
        EmbeddingBackend::Local => EmbeddingProvider::local_models(
            &config.embedding.text_model,
            &config.embedding.image_model,
            Some(data_dir.join("models")),
            config.embedding.use_gpu,
        ),
        EmbeddingBackend::Hash => EmbeddingProvider::new(
            Arc::new(HashEmbedder::new(HASH_TEXT_DIM)),
            Arc::new(HashEmbedder::cross_modal(HASH_IMAGE_DIM)),
        )?,
    };
    Ok(provider.with_batch_size(config.embedding.batch_size))
}

/// Create the standard component stack.
async fn create_components(config: &Config) -> Result<Components> {
    let data_dir = config.data_dir().context("Failed to get data directory")?;
    let embedder = build_embedder(config, &data_dir)?;

    let db_path = data_dir.join("vectors");
    IndexModels::of(&embedder).check_or_record(&db_path)?;

    let store = Arc::new(LanceStore::new(
        db_path,
        embedder.text_dimension(),
        embedder.image_dimension(),
    ));
    store.init().await.context("Failed to initialize store")?;

    Ok(Components {
        store,
        embedder,
        data_dir,
    })
}

fn build_pipeline(config: &Config, components: &Components) -> IngestionPipeline {
    let extraction = &config.extraction;
    let mut ocr = OcrConfig {
        enabled: extraction.ocr_enabled,
        language: extraction.ocr_language.clone(),
        ..OcrConfig::default()
    };
    if let Some(ref command) = extraction.ocr_command {
        ocr.command = command.clone();
    }

    let extractors = Extractors::new(
        ocr.build(),
        Arc::new(PdfiumRenderer::new(extraction.pdfium_library.clone())),
        extraction.render_scale,
    );

    IngestionPipeline::new(
        components.store.clone() as Arc<dyn VectorStore>,
        Arc::new(LocalFileStore::new(&components.data_dir)),
        components.embedder.clone(),
        Arc::new(extractors),
    )
}

fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let file_layer = match config.file {
        Some(ref path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config from file or CLI-specified path
    let config = if let Some(ref path) = cli.config {
        Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    init_logging(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::Ingest {
            files,
            content_type,
        } => {
            let components = create_components(&config).await?;
            let pipeline = build_pipeline(&config, &components);

            let mut outputs = Vec::with_capacity(files.len());
            let mut failures = 0usize;
            for path in files {
                let file = path.display().to_string();
                match ingest_file(&pipeline, &path, content_type.as_deref()).await {
                    Ok(report) => outputs.push(IngestOutput {
                        file,
                        report: Some(report),
                        error: None,
                    }),
                    Err(e) => {
                        failures += 1;
                        warn!("Failed to ingest {}: {:#}", file, e);
                        outputs.push(IngestOutput {
                            file,
                            report: None,
                            error: Some(format!("{e:#}")),
                        });
                    }
                }
            }

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&outputs)?);
                }
                OutputFormat::Text => {
                    for output in &outputs {
                        match (&output.report, &output.error) {
                            (Some(report), _) => println!(
                                "{}: {} ({}, {} chunks, {} images, {} OCR chars)",
                                output.file,
                                report.doc_id,
                                report.file_type,
                                report.chunk_count,
                                report.image_count,
                                report.ocr_chars
                            ),
                            (None, Some(error)) => println!("{}: error: {}", output.file, error),
                            (None, None) => {}
                        }
                    }
                }
            }

            if failures > 0 {
                anyhow::bail!("{failures} of {} files failed to ingest", outputs.len());
            }
        }

        Commands::Query { query, top_k } => {
            let top_k = top_k.unwrap_or(config.query.default_top_k);
            if top_k > config.query.max_top_k {
                anyhow::bail!(
                    "--top-k {top_k} exceeds the configured maximum of {}",
                    config.query.max_top_k
                );
            }

            let components = create_components(&config).await?;
            let engine = RetrievalEngine::new(
                components.store.clone() as Arc<dyn VectorStore>,
                components.embedder.clone(),
            );

            let response = engine
                .query(&query, top_k)
                .await
                .context("Query execution failed")?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                OutputFormat::Text => {
                    println!("Query: {}\n", response.query);
                    if response.results.is_empty() {
                        println!("No results found.");
                    } else {
                        for (i, result) in response.results.iter().enumerate() {
                            print_result(i + 1, result);
                        }
                    }
                }
            }
        }

        Commands::Status => {
            let components = create_components(&config).await?;
            let stats = components.store.stats().await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        data_dir: components.data_dir.to_string_lossy().to_string(),
                        text_model: components.embedder.text_model().to_string(),
                        image_model: components.embedder.image_model().to_string(),
                        text_records: stats.text_records,
                        image_records: stats.image_records,
                        documents: stats.documents,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Store at {}", components.data_dir.display());
                    println!("  Documents:     {}", stats.documents);
                    println!(
                        "  Text records:  {} ({})",
                        stats.text_records,
                        components.embedder.text_model()
                    );
                    println!(
                        "  Image records: {} ({})",
                        stats.image_records,
                        components.embedder.image_model()
                    );
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

async fn ingest_file(
    pipeline: &IngestionPipeline,
    path: &Path,
    content_type: Option<&str>,
) -> Result<mmrag_core::IngestReport> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut upload = Upload::new(file_name, data);
    if let Some(content_type) = content_type {
        upload = upload.with_content_type(content_type);
    }

    info!("Ingesting {}", path.display());
    Ok(pipeline.ingest(upload).await?)
}

fn print_result(rank: usize, result: &QueryResult) {
    println!("{}. [{}] {} (score: {:.3})", rank, result.modality, result.id, result.score);
    println!("   {}", result.source);
    match &result.content {
        ResultContent::Text { text } => println!("   {}", truncate(text, 100)),
        ResultContent::Image {
            image_path,
            ocr_text,
        } => {
            if let Some(path) = image_path {
                println!("   Image: {path}");
            }
            if !ocr_text.is_empty() {
                println!("   OCR: {}", truncate(ocr_text, 100));
            }
        }
    }
    println!();
}

/// Truncate a string to max length in characters, adding ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
