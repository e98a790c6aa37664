//! Diary RAG command line
//!
//! Run with: cargo run -p diary-rag --features cli --bin diary-rag -- --help

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diary_rag::config::RagConfig;
use diary_rag::evaluation::{build_grader, evaluate, parse_qa_pairs, EvaluationReport};
use diary_rag::ingestion::{collect_sources, extract_text, Chunker, ChunkingStats};
use diary_rag::pipeline::RagPipeline;
use diary_rag::providers::ZillizIndex;
use diary_rag::server::RagServer;

const STATS_PAGE_SIZE: usize = 100;

/// Grounded question answering over a diary document
#[derive(Parser)]
#[command(name = "diary-rag", version, about)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long, global = true, env = "DIARY_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index a file or directory
    Ingest {
        /// File or directory to ingest
        path: PathBuf,

        /// Create the Zilliz collection before inserting
        #[arg(long)]
        create_collection: bool,
    },

    /// Print the units a document chunks into, without indexing
    Chunk {
        /// File to chunk
        path: PathBuf,

        /// Print per-section statistics instead of the units
        #[arg(long)]
        stats: bool,
    },

    /// Answer a single question
    Ask {
        /// The question
        question: String,

        /// Also print the context passages
        #[arg(long)]
        show_context: bool,
    },

    /// Grade answers for a question file against an answer file
    Eval {
        /// One question per line
        #[arg(long)]
        questions: PathBuf,

        /// One expected answer per line, aligned with the questions
        #[arg(long)]
        answers: PathBuf,

        /// Where to write the JSON report
        #[arg(long, default_value = "evaluation_results.json")]
        output: PathBuf,
    },

    /// Show the row count of the configured collection
    Stats {
        /// Also print every stored entry
        #[arg(long)]
        entries: bool,
    },

    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diary_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Chunk { path, stats } => {
            // Chunking needs no credentials, so the config is not validated
            let config = match config_path {
                Some(path) => RagConfig::from_file(path)?,
                None => RagConfig::default(),
            };
            chunk_file(&config, &path, stats)
        }
        Commands::Ingest {
            path,
            create_collection,
        } => ingest(&RagConfig::load(config_path)?, &path, create_collection).await,
        Commands::Ask {
            question,
            show_context,
        } => ask(&RagConfig::load(config_path)?, &question, show_context).await,
        Commands::Eval {
            questions,
            answers,
            output,
        } => eval(&RagConfig::load(config_path)?, &questions, &answers, &output).await,
        Commands::Stats { entries } => stats(&RagConfig::load(config_path)?, entries).await,
        Commands::Serve => {
            let server = RagServer::new(RagConfig::load(config_path)?).await?;
            server.initialize().await?;
            println!("{} http://{}", style("Serving on").green().bold(), server.address());
            server.start().await?;
            Ok(())
        }
    }
}

fn chunk_file(config: &RagConfig, path: &Path, stats: bool) -> anyhow::Result<()> {
    let chunker = Chunker::from_config(&config.chunking)?;
    let text = extract_text(path)?;
    let records = chunker.chunk_records(&text);

    if stats {
        let stats = ChunkingStats::from_records(&records);
        println!("{}", style("Chunking statistics").bold());
        println!("  Sections:           {}", stats.total_sections);
        println!("  Chunks:             {}", stats.total_chunks);
        println!("  Outside a section:  {}", stats.unlabeled_chunks);
        println!("  Avg per section:    {:.2}", stats.avg_chunks_per_section);
        for (marker, count) in &stats.chunks_per_section {
            println!("    {:>4}  {}", count, style(marker).dim());
        }
        return Ok(());
    }

    for record in &records {
        println!(
            "{} {}",
            style(format!("[{}]", record.ordinal)).cyan(),
            style(record.source_marker.as_deref().unwrap_or("-")).dim()
        );
        println!("{}\n", record.text);
    }
    Ok(())
}

async fn ingest(config: &RagConfig, path: &Path, create_collection: bool) -> anyhow::Result<()> {
    config.require_persistent_index()?;

    if create_collection {
        let index = ZillizIndex::new(&config.vector_db)?;
        index
            .create_collection(&config.vector_db.collection, config.embeddings.dimensions)
            .await?;
        println!(
            "{} collection '{}'",
            style("Created").green(),
            config.vector_db.collection
        );
    }

    let sources = collect_sources(path)?;
    if sources.is_empty() {
        bail!("No supported documents under {}", path.display());
    }

    let bar = ProgressBar::new(sources.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} extracting [{bar:30}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );

    let mut texts = Vec::with_capacity(sources.len());
    for source in &sources {
        bar.set_message(source.display().to_string());
        texts.push(
            extract_text(source).with_context(|| format!("failed to read {}", source.display()))?,
        );
        bar.inc(1);
    }
    bar.finish_and_clear();

    let pipeline = RagPipeline::from_config(config).await?;
    pipeline.verify_embedding_dimensions().await?;

    // One run over every file keeps ids dense across the collection
    let records = pipeline.ingestor().chunk_records(&texts.join("\n\n"));

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("embedding {} units", records.len()));
    let written = pipeline.ingestor().ingest_records(&records).await?;
    spinner.finish_and_clear();

    println!(
        "{} {} entries into '{}'",
        style("Indexed").green().bold(),
        written,
        pipeline.collection()
    );
    Ok(())
}

async fn stats(config: &RagConfig, entries: bool) -> anyhow::Result<()> {
    config.require_persistent_index()?;

    let index = ZillizIndex::new(&config.vector_db)?;
    let collection = &config.vector_db.collection;
    let stats = index.collection_stats(collection).await?;
    println!(
        "{} '{}': {} rows",
        style("Collection").bold(),
        collection,
        stats.row_count
    );

    if entries {
        for entry in index.query_all(collection, STATS_PAGE_SIZE).await? {
            println!("{} {}", style(format!("[{}]", entry.id)).cyan(), entry.text);
        }
    }
    Ok(())
}

async fn ask(config: &RagConfig, question: &str, show_context: bool) -> anyhow::Result<()> {
    config.require_persistent_index()?;
    let pipeline = RagPipeline::from_config(config).await?;
    let outcome = pipeline.query(question).await;

    if !outcome.succeeded {
        println!("{}", style(&outcome.answer).yellow());
        return Ok(());
    }

    println!("{}", outcome.answer);
    if show_context {
        for (id, passage) in outcome.source_ids.iter().zip(&outcome.context) {
            println!("\n{} {}", style(format!("[{}]", id)).cyan(), passage);
        }
    } else {
        println!("\n{} {}", style("Sources:").dim(), outcome.source_ids.join(", "));
    }
    Ok(())
}

async fn eval(
    config: &RagConfig,
    questions: &Path,
    answers: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    config.require_persistent_index()?;

    let questions = std::fs::read_to_string(questions)
        .with_context(|| format!("failed to read {}", questions.display()))?;
    let answers = std::fs::read_to_string(answers)
        .with_context(|| format!("failed to read {}", answers.display()))?;
    let pairs = parse_qa_pairs(&questions, &answers);

    let pipeline = RagPipeline::from_config(config).await?;
    let grader = build_grader(&config.llm)?;

    let bar = ProgressBar::new(pairs.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} grading [{bar:30}] {pos}/{len} {elapsed}",
    )?);

    let mut records = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        records.extend(evaluate(&pipeline, grader.as_ref(), std::slice::from_ref(pair)).await);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let report = EvaluationReport::new(records);
    std::fs::write(output, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    match report.mean_grade {
        Some(mean) => println!("{} {:.3}", style("Mean grade:").bold(), mean),
        None => println!("{}", style("No numeric grades").yellow()),
    }
    println!("Report written to {}", output.display());
    Ok(())
}
