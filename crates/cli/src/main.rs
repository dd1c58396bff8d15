mod datagen;
mod eval;

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linex_core::Lineage;
use linex_rag::{explain, Dispatcher, EmbeddingClient, RetrievalConfig, StepIndex};

const DEFAULT_LINEAGE_PATH: &str = "data/lineage.json";

#[derive(Parser, Debug)]
#[command(name = "linex", version, about = "Financial data lineage explainer")]
struct Cli {
    /// Path to the lineage corpus (falls back to LINEX_LINEAGE).
    #[arg(long, global = true)]
    lineage: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Explain how a metric was computed.
    Explain {
        query: String,
        /// Semantic search width.
        #[arg(long)]
        k: Option<usize>,
        /// How many candidates reach the prompt.
        #[arg(long = "top-k")]
        top_k: Option<usize>,
    },
    /// Write the synthetic demo corpus (lineage plus fact tables).
    GenerateData {
        #[arg(long, default_value = "data")]
        out: PathBuf,
        #[arg(long, default_value_t = 600)]
        transactions: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Score pipeline answers against ground truth.
    Eval {
        #[arg(long, default_value = "tests.json")]
        tests: PathBuf,
        #[arg(long, default_value = "eval_results.json")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let lineage_path = resolve_lineage_path(cli.lineage);
    match cli.command {
        Commands::Explain { query, k, top_k } => run_explain(&lineage_path, &query, k, top_k),
        Commands::GenerateData {
            out,
            transactions,
            seed,
        } => datagen::generate(&out, transactions, seed),
        Commands::Eval { tests, out } => {
            let lineage = Lineage::load(&lineage_path)?;
            let embeddings = EmbeddingClient::from_env()?;
            let index = StepIndex::build(&lineage, embeddings.clone())?;
            let dispatcher = Dispatcher::from_env()?;
            eval::run_eval(&lineage, &index, &embeddings, &dispatcher, &tests, &out)
        }
    }
}

fn run_explain(
    lineage_path: &PathBuf,
    query: &str,
    k: Option<usize>,
    top_k: Option<usize>,
) -> Result<()> {
    let lineage = Lineage::load(lineage_path)?;
    let embeddings = EmbeddingClient::from_env()?;
    let mut config = RetrievalConfig::from_env();
    if let Some(k) = k {
        config.k = k;
    }
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }
    let index = StepIndex::build(&lineage, embeddings)?.with_min_score(config.min_score);
    let dispatcher = Dispatcher::from_env()?;
    let explanation = explain(&index, &lineage, &dispatcher, &config, query)?;
    println!("{}", explanation.answer.trim_end());
    println!();
    println!("Referenced metrics:");
    if explanation.referenced_metrics.is_empty() {
        println!("none");
    } else {
        for metric in &explanation.referenced_metrics {
            println!("- {metric}");
        }
    }
    Ok(())
}

fn resolve_lineage_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var("LINEX_LINEAGE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LINEAGE_PATH))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
