use acuadvisor_embed::{EmbedConfig, FastEmbedProvider};
use acuadvisor_retriever::{
    DEFAULT_TOP_K, Retriever, VectorIndex,
    storage::{IndexSource, sqlite_store::SqliteIndexStore},
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Inspect a pre-built clinical guideline index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the index file
    #[arg(short, long, default_value = "clinical_index.db")]
    index: PathBuf,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show index manifest and size
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// List chunks in insertion order
    List {
        /// Limit number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Get a specific chunk by ID
    Get {
        /// Chunk ID
        id: i64,
        /// Output format
        #[arg(short, long, default_value = "full")]
        format: OutputFormat,
    },
    /// Retrieve the chunks most similar to a query
    Search {
        /// Query text
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Directory for downloaded embedding model weights
        #[arg(long)]
        model_cache: Option<PathBuf>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput {
    id: i64,
    text: String,
    source: serde_json::Map<String, serde_json::Value>,
    dimension: usize,
}

#[derive(Serialize)]
struct SimilarityResult {
    rank: usize,
    score: f32,
    chunk: ChunkOutput,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Commands::Stats { format } => {
            let store = SqliteIndexStore::open(&args.index).await?;
            let manifest = store.manifest().await?;
            let chunk_count = store.chunk_count().await?;

            match format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({
                            "path": args.index,
                            "chunk_count": chunk_count,
                            "manifest": manifest,
                        }))?
                    );
                }
                _ => {
                    println!("Index: {}", args.index.display());
                    println!("  Chunks: {chunk_count}");
                    println!("  Embedding model: {}", manifest.embedding_model);
                    println!("  Dimension: {}", manifest.dimension);
                    println!("  Metric: {}", manifest.metric);
                }
            }
            Ok(())
        }
        Commands::List { limit, format } => {
            let store = SqliteIndexStore::open(&args.index).await?;
            let summaries = store.list_chunks(limit).await?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summaries)?);
                }
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Found {} chunks:", summaries.len());
                    for summary in summaries {
                        println!("  ID: {} | {}", summary.id, summary.preview.replace('\n', " "));
                    }
                }
            }
            Ok(())
        }
        Commands::Get { id, format } => {
            let store = SqliteIndexStore::open(&args.index).await?;
            let chunk = store
                .get_chunk(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Chunk {} not found", id))?;

            let output = ChunkOutput {
                id: chunk.id,
                dimension: chunk.embedding.len(),
                text: chunk.text,
                source: chunk.source,
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Summary => {
                    println!("Chunk {} ({} dims)", output.id, output.dimension);
                }
                OutputFormat::Full => {
                    println!("Chunk ID: {}", output.id);
                    println!("Dimension: {}", output.dimension);
                    if !output.source.is_empty() {
                        println!("Source: {}", serde_json::Value::Object(output.source));
                    }
                    println!("---");
                    println!("{}", output.text);
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            top_k,
            model_cache,
            format,
        } => {
            let manifest = SqliteIndexStore::open(&args.index).await?.manifest().await?;

            // Query with the model the index was built with
            let mut embed_config = EmbedConfig::new(manifest.embedding_model.clone());
            if let Some(dir) = model_cache {
                embed_config = embed_config.with_cache_dir(dir);
            }
            let provider = Arc::new(FastEmbedProvider::create(embed_config).await?);
            let index = Arc::new(VectorIndex::load_for(&args.index, provider.as_ref()).await?);
            let retriever = Retriever::new(provider, index)?;

            let result = retriever.retrieve(&query, top_k).await?;
            let results: Vec<SimilarityResult> = result
                .into_iter()
                .enumerate()
                .map(|(i, hit)| SimilarityResult {
                    rank: i + 1,
                    score: hit.score,
                    chunk: ChunkOutput {
                        id: hit.chunk.id,
                        text: hit.chunk.text.clone(),
                        source: hit.chunk.source.clone(),
                        dimension: hit.chunk.embedding.len(),
                    },
                })
                .collect();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Summary => {
                    println!("Top {} chunks for '{}':", results.len(), query);
                    for result in &results {
                        let preview: String = result.chunk.text.chars().take(100).collect();
                        println!(
                            "  {}. [{:.3}] ID {} | {}",
                            result.rank,
                            result.score,
                            result.chunk.id,
                            preview.replace('\n', " ")
                        );
                    }
                }
                OutputFormat::Full => {
                    for result in &results {
                        println!(
                            "#{} score {:.4} chunk {}",
                            result.rank, result.score, result.chunk.id
                        );
                        println!("{}\n", result.chunk.text);
                    }
                }
            }
            Ok(())
        }
    }
}
