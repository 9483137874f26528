//! CLI entry point for the question-answer retriever.
//!
//! Provides commands for building, inspecting and querying a persisted index.
//! Main components: Cli parser, Commands enum, and the `run` dispatcher.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Serialize;
use wenda::config::EmbeddingStrategy;
use wenda::display::{create_results_table, create_stats_table};
use wenda::io::ExitCode;
use wenda::{CorpusSource, Record, Retriever, RetrieverError, SearchResult, Settings};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Semantic question retrieval
#[derive(Parser)]
#[command(
    name = "wenda",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic question retrieval",
    long_about = "Build an index over a cleaned question-answer corpus and retrieve the closest questions.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the index directory from settings
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .wenda directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Build the index from a corpus file
    #[command(
        about = "Build the searchable index from a cleaned JSON corpus",
        after_help = "Examples:\n  wenda build --corpus data/qa.json\n  wenda build --corpus data/qa.json --strategy tfidf --force"
    )]
    Build {
        /// JSON array of {id, question, answer, source?, link?, tags?}
        #[arg(long)]
        corpus: PathBuf,

        /// Rebuild even if the saved index matches the corpus
        #[arg(short, long)]
        force: bool,

        /// Embedding strategy (overrides config)
        #[arg(long)]
        strategy: Option<EmbeddingStrategy>,
    },

    /// Query the index
    #[command(
        about = "Find the questions closest to a query",
        after_help = "Examples:\n  wenda search 公交车\n  wenda search \"怎么租房\" -k 3 --json\n  wenda search 签证 --tag 移民 --threshold 0.3"
    )]
    Search {
        /// Free-text query
        query: String,

        /// Number of results (defaults to retrieval.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Only keep records carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Drop results scoring below this value
        #[arg(long)]
        threshold: Option<f32>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a single record
    #[command(about = "Print the record with the given id")]
    Show {
        id: String,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// List all tags in the corpus
    #[command(about = "List the tags present in the indexed corpus")]
    Categories,

    /// Show index statistics
    #[command(about = "Display index statistics")]
    Stats {
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .wenda/settings.toml")]
    Config,
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    k: usize,
    elapsed_ms: u128,
    results: &'a [SearchResult],
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => match Settings::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!(
                    "Configuration error loading from {}: {e}",
                    path.display()
                );
                return ExitCode::ConfigError.into();
            }
        },
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            eprintln!("Using default configuration.");
            Settings::default()
        }),
    };
    if let Some(index) = &cli.index {
        settings.index_path = index.clone();
    }

    wenda::logging::init(settings.debug);

    match run(cli.command, settings) {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            match e.downcast_ref::<RetrieverError>() {
                Some(retriever_error) => {
                    for suggestion in retriever_error.recovery_suggestions() {
                        eprintln!("  - {suggestion}");
                    }
                    ExitCode::from_error(retriever_error).into()
                }
                None => ExitCode::GeneralError.into(),
            }
        }
    }
}

fn run(command: Commands, mut settings: Settings) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
            Ok(ExitCode::Success)
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
            Ok(ExitCode::Success)
        }

        Commands::Build {
            corpus,
            force,
            strategy,
        } => {
            if let Some(strategy) = strategy {
                settings.embedding.strategy = strategy;
            }
            let records = wenda::load_records(&corpus)
                .with_context(|| format!("while building from {}", corpus.display()))?;

            let start = Instant::now();
            let retriever = Retriever::new(&settings);
            retriever.initialize(CorpusSource::PersistedOrBuild {
                path: settings.index_path.clone(),
                records,
                force_rebuild: force,
            })?;

            let stats = retriever.stats();
            println!(
                "Index ready: {} records with {} in {:.2}s",
                stats.record_count,
                stats.strategy.unwrap_or("-"),
                start.elapsed().as_secs_f64()
            );
            println!("Index path: {}", settings.index_path.display());
            Ok(ExitCode::Success)
        }

        Commands::Search {
            query,
            k,
            tag,
            threshold,
            json,
        } => {
            let retriever = open_index(&settings)?;
            let k = k.unwrap_or_else(|| retriever.default_k());

            let start = Instant::now();
            let results = match (&tag, threshold) {
                (Some(tag), min_score) => {
                    let mut results = retriever.search_by_tag(&query, tag, k)?;
                    if let Some(min_score) = min_score {
                        results.retain(|r| r.score >= min_score);
                    }
                    results
                }
                (None, Some(min_score)) => retriever.search_with_threshold(&query, k, min_score)?,
                (None, None) => retriever.search(&query, k)?,
            };
            let elapsed = start.elapsed();

            if json {
                let output = SearchOutput {
                    query: &query,
                    k,
                    elapsed_ms: elapsed.as_millis(),
                    results: &results,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if results.is_empty() {
                println!("No results for '{query}'");
            } else {
                println!("{}", create_results_table(&results));
            }
            Ok(ExitCode::Success)
        }

        Commands::Show { id, json } => {
            let retriever = open_index(&settings)?;
            let record = retriever.record_by_id(&id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
            Ok(ExitCode::Success)
        }

        Commands::Categories => {
            let retriever = open_index(&settings)?;
            for tag in retriever.categories()? {
                println!("{tag}");
            }
            Ok(ExitCode::Success)
        }

        Commands::Stats { json } => {
            let retriever = open_index(&settings)?;
            let stats = retriever.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", create_stats_table(&stats));
            }
            Ok(ExitCode::Success)
        }
    }
}

fn open_index(settings: &Settings) -> Result<Retriever, RetrieverError> {
    let retriever = Retriever::new(settings);
    retriever.initialize(CorpusSource::Persisted(settings.index_path.clone()))?;
    Ok(retriever)
}

fn print_record(record: &Record) {
    println!("[{}] {}", record.id, record.question);
    println!();
    println!("{}", record.answer);
    if !record.tags.is_empty() {
        println!();
        println!("Tags: {}", record.tags.join(", "));
    }
    if !record.source.is_empty() {
        println!("Source: {}", record.source);
    }
    if !record.link.is_empty() {
        println!("Link: {}", record.link);
    }
}
