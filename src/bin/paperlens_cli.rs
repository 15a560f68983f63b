use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use paperlens::{
    config,
    extraction::discover_documents,
    logging,
    processing::ProcessingResult,
    retrieval::MetadataFilter,
    review::{ReviewDocument, ReviewFocus},
    service::ResearchService,
};

#[derive(Parser)]
#[command(
    name = "paperlens-cli",
    about = "Index papers, ask grounded questions, and run literature reviews"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk every `.txt` paper under a directory and build the index.
    ///
    /// Author, year and title are read per paper from a sidecar `<name>.meta.json`.
    Ingest {
        dir: PathBuf,
        /// Embedding model override.
        #[arg(long)]
        embedding_model: Option<String>,
    },
    /// Ask a question against the indexed papers.
    Ask {
        question: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        source_file: Option<String>,
    },
    /// Summarize every paper under a directory and compare them.
    Review {
        dir: PathBuf,
        #[arg(long, default_value_t = ReviewFocus::Comprehensive)]
        focus: ReviewFocus,
        /// Append per-paper summaries to the report.
        #[arg(long)]
        individual: bool,
        /// Write the Markdown report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List stored collections.
    Collections,
    /// List the documents stored in a collection.
    Documents { collection: String },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();
    let service = ResearchService::from_config(config)
        .await
        .context("Failed to initialize research service")?;

    match cli.command {
        Command::Ingest {
            dir,
            embedding_model,
        } => ingest(&service, &dir, embedding_model.as_deref()).await,
        Command::Ask {
            question,
            k,
            author,
            year,
            source_file,
        } => {
            let filter = MetadataFilter {
                author,
                year,
                source_file,
                ..MetadataFilter::default()
            };
            let answer = service
                .query(&question, k, Some(&filter))
                .await
                .context("Query failed")?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nSources:");
                for source in &answer.sources {
                    let metadata = &source.chunk.metadata;
                    println!(
                        "- {} p.{} chunk {} (score {:.3})",
                        metadata.source_file,
                        metadata.page_number,
                        metadata.chunk_index,
                        source.similarity_score
                    );
                }
            }
            Ok(())
        }
        Command::Review {
            dir,
            focus,
            individual,
            output,
        } => {
            let documents = process_dir(&service, &dir)
                .await?
                .into_iter()
                .map(|(source_id, result)| ReviewDocument::from_processing(source_id, result))
                .collect();
            let review = service
                .run_literature_review(documents, focus, individual)
                .await;
            let report = service.export_report(&review);
            match output {
                Some(path) => {
                    tokio::fs::write(&path, report)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!(
                        "Review written to {} ({} of {} papers summarized)",
                        path.display(),
                        review.successful_count,
                        review.total_papers
                    );
                }
                None => println!("{report}"),
            }
            Ok(())
        }
        Command::Collections => {
            let collections = service
                .list_collections()
                .await
                .context("Failed to list collections")?;
            for info in collections {
                println!(
                    "{}\tmodel={}\tdim={}\tvectors={}",
                    info.name, info.embedding_model, info.dimension, info.vector_count
                );
            }
            Ok(())
        }
        Command::Documents { collection } => {
            let documents = service
                .list_documents(&collection)
                .await
                .with_context(|| format!("Failed to list documents of '{collection}'"))?;
            for document in documents {
                println!(
                    "{}\tauthor={}\tyear={}\tchunks={}",
                    document.source_file,
                    document.author.as_deref().unwrap_or("-"),
                    document
                        .year
                        .map(|year| year.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    document.chunk_count
                );
            }
            Ok(())
        }
    }
}

async fn ingest(
    service: &ResearchService,
    dir: &Path,
    embedding_model: Option<&str>,
) -> Result<()> {
    let mut chunks = Vec::new();
    for (source_id, result) in process_dir(service, dir).await? {
        match result {
            Ok(document) => {
                eprintln!("{source_id}: {} chunks", document.chunks.len());
                chunks.extend(document.chunks);
            }
            Err(err) => eprintln!("{source_id}: skipped ({err})"),
        }
    }
    if chunks.is_empty() {
        bail!("no chunks produced from {}", dir.display());
    }

    let handle = service
        .build_index(&chunks, embedding_model)
        .await
        .context("Failed to build index")?;
    println!(
        "Indexed {} vectors into '{}' (model {}, dim {})",
        handle.vector_count, handle.name, handle.embedding_model_id, handle.dimension
    );
    Ok(())
}

async fn process_dir(
    service: &ResearchService,
    dir: &Path,
) -> Result<Vec<(String, ProcessingResult)>> {
    let sources = discover_documents(dir)
        .await
        .with_context(|| format!("Failed to scan {}", dir.display()))?;
    if sources.is_empty() {
        bail!("no .txt documents found under {}", dir.display());
    }

    let mut results = Vec::with_capacity(sources.len());
    for source in sources {
        let result = service.process_source(&source).await;
        results.push((source.source_file, result));
    }
    Ok(results)
}
