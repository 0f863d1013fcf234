#![forbid(unsafe_code)]

mod cmd;
mod output;

use caremind_core::{ErrorCode, Settings};
use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "caremind: bilingual clinical guideline and drug retrieval",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging (debug level unless CAREMIND_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a caremind.toml config file.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for --format json.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Query",
        about = "Answer a clinical question with cited evidence",
        long_about = "Retrieve guideline evidence (and optionally one drug record) and compose a \
                      templated, citation-annotated draft answer.",
        after_help = "EXAMPLES:\n    # Ask in Chinese (default)\n    caremind ask \"老年高血压的降压目标？\"\n\n    \
                      # Include a drug and answer in English\n    caremind ask \"Contraindications?\" --drug 阿司匹林 --lang en\n\n    \
                      # Print the model prompt instead of the draft\n    caremind ask \"糖尿病控制目标\" --print-prompt\n\n    \
                      # Fail instead of falling back to the demo answer\n    caremind ask \"...\" --strict --json"
    )]
    Ask(cmd::ask::AskArgs),

    #[command(
        next_help_heading = "Query",
        about = "Hybrid search over guidelines and drugs",
        long_about = "Run one hybrid query and show the guideline hits, the drug hits and the \
                      fused ranking.",
        after_help = "EXAMPLES:\n    # Default linear fusion\n    caremind search 阿司匹林禁忌症\n\n    \
                      # Reciprocal rank fusion, top 5\n    caremind search 阿司匹林禁忌症 --strategy rrf --topn 5\n\n    \
                      # Weight drugs more heavily\n    caremind search 华法林 --alpha 0.3 --json"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Query",
        about = "Look up one drug record",
        long_about = "Look up a drug by exact name, falling back to a substring match.",
        after_help = "EXAMPLES:\n    # Exact name\n    caremind drug 阿司匹林\n\n    \
                      # Machine-readable output\n    caremind drug Aspirin --json"
    )]
    Drug(cmd::drug::DrugArgs),

    #[command(
        next_help_heading = "Ingest",
        about = "Load drug records from JSON lines",
        long_about = "Upsert drug records from a JSON-lines file. Chinese and English column \
                      names are both accepted.",
        after_help = "EXAMPLES:\n    # Load and build the full-text index\n    caremind load-drugs data/drugs.jsonl --with-fts\n\n    \
                      # Abort on the first bad record\n    caremind load-drugs data/drugs.jsonl --strict"
    )]
    LoadDrugs(cmd::load_drugs::LoadDrugsArgs),

    #[command(
        next_help_heading = "Ingest",
        about = "Index guideline chunks from JSON lines",
        long_about = "Embed and store guideline chunks ({content, meta} per line). Chunks whose \
                      content is unchanged are not re-embedded.",
        after_help = "EXAMPLES:\n    # Index into the configured collection\n    caremind index-guidelines data/chunks.jsonl\n\n    \
                      # Index into a named collection\n    caremind index-guidelines data/chunks.jsonl --collection cardiology"
    )]
    IndexGuidelines(cmd::index_guidelines::IndexGuidelinesArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    caremind completions bash > /etc/bash_completion.d/caremind"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CAREMIND_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "caremind=debug,info"
        } else {
            "caremind=info,warn"
        })
    });

    let format = env::var("CAREMIND_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            let mode = resolve_output_mode(cli.format, cli.json, None);
            let error = CliError::coded(ErrorCode::ConfigParseError, format!("{err:#}"));
            return report(mode, &error);
        }
    };
    debug!(?settings, "settings resolved");

    let output = resolve_output_mode(cli.format, cli.json, settings.output.as_deref());

    let result = match cli.command {
        Commands::Ask(ref args) => cmd::ask::run_ask(args, output, &settings),
        Commands::Search(ref args) => cmd::search::run_search(args, output, &settings),
        Commands::Drug(ref args) => cmd::drug::run_drug(args, output, &settings),
        Commands::LoadDrugs(ref args) => cmd::load_drugs::run_load_drugs(args, output, &settings),
        Commands::IndexGuidelines(ref args) => {
            cmd::index_guidelines::run_index_guidelines(args, output, &settings)
        }
        Commands::Completions(ref args) => {
            cmd::completions::run_completions(args.shell, &mut Cli::command())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(output, &CliError::from_anyhow(&err)),
    }
}

fn report(mode: OutputMode, error: &CliError) -> ExitCode {
    if render_error(mode, error).is_err() {
        eprintln!("error: {}", error.message);
    }
    ExitCode::FAILURE
}
