//! chainlift CLI entry point
//!
//! Rank, inspect and project through UCSC chain alignment files.

use anyhow::Context;
use chainlift::core::{init_logging, AlignmentCollection, ChainReader, LogLevel, ParallelConfig};
use chainlift::formats;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "chainlift")]
#[command(about = "Streaming chain file reader and interval projection")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Worker threads (0 disables parallelism; default: min(cores, 8))
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    /// Minimum work items before parallel dispatch is used
    #[arg(long = "min-parallel-items", global = true, default_value = "100")]
    min_parallel_items: usize,

    /// Log level: DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long = "log-level", global = true, default_value = "WARNING")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List chain ids by descending score
    Rank {
        /// Chain file (.chain, .chain.gz or .chain.bz2)
        chain: PathBuf,
        /// Keep only the N highest-scoring chains
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Drop chains scoring below this value
        #[arg(long = "min-score", allow_hyphen_values = true)]
        min_score: Option<i64>,
    },
    /// Project BED intervals from the target onto the query assembly
    Project {
        /// Chain file (.chain, .chain.gz or .chain.bz2)
        chain: PathBuf,
        /// Input BED file on the target assembly
        input: PathBuf,
        /// Output file (stdout if not specified)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
        /// Drop chains scoring below this value
        #[arg(long = "min-score", allow_hyphen_values = true)]
        min_score: Option<i64>,
        /// Project through this chain only
        #[arg(long = "chain-id")]
        chain_id: Option<u64>,
    },
    /// Print record, block and omission counts
    Stats {
        /// Chain file (.chain, .chain.gz or .chain.bz2)
        chain: PathBuf,
        /// Drop chains scoring below this value
        #[arg(long = "min-score", allow_hyphen_values = true)]
        min_score: Option<i64>,
    },
}

fn parallel_config(global: &GlobalArgs) -> anyhow::Result<ParallelConfig> {
    let config = ParallelConfig::detect().with_min_items_for_parallel(global.min_parallel_items);
    let config = match global.threads {
        Some(threads) => config.with_max_workers(threads)?,
        None => config,
    };
    Ok(config)
}

fn load_chain(path: &Path, min_score: Option<i64>, parallel: ParallelConfig) -> anyhow::Result<AlignmentCollection> {
    let start = Instant::now();
    eprintln!("Loading chain file: {:?}", path);

    let mut reader = ChainReader::new().parallel(parallel);
    if let Some(min_score) = min_score {
        reader = reader.min_score(min_score);
    }
    let collection = reader
        .read(path)
        .with_context(|| format!("Failed to load chain file {}", path.display()))?;

    eprintln!(
        "Loaded {} chain(s) in {:.2}s",
        collection.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(collection)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level: LogLevel = cli.global.log_level.parse()?;
    init_logging(level)?;

    let parallel = parallel_config(&cli.global)?;
    let summary = parallel.summary();
    log::info!(
        "Cores: {}, workers: {}, parallel threshold: {}",
        summary.available_cores,
        summary.max_workers,
        summary.min_items_for_parallel
    );
    let start = Instant::now();

    match cli.command {
        Commands::Rank { chain, limit, min_score } => {
            let collection = load_chain(&chain, min_score, parallel)?;
            for (chain_id, score) in collection.rank_by_score(limit) {
                println!("{}\t{}", chain_id, score);
            }
        }

        Commands::Project { chain, input, output, min_score, chain_id } => {
            let collection = load_chain(&chain, min_score, parallel)?;
            let pool = parallel.build_pool()?;

            eprintln!("Projecting BED file: {:?}", input);
            let stats = formats::project_bed(
                &input,
                output.as_deref(),
                &collection,
                chain_id,
                pool.as_ref(),
                &parallel,
            )?;

            eprintln!("\n=== Projection Statistics ===");
            eprintln!("Total intervals: {}", stats.total);
            eprintln!("Projected:       {}", stats.projected);
            eprintln!("Unmapped:        {}", stats.unmapped);
            eprintln!("Failed:          {}", stats.failed);
            eprintln!("Output pieces:   {}", stats.pieces);
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }

        Commands::Stats { chain, min_score } => {
            let collection = load_chain(&chain, min_score, parallel)?;
            let blocks: usize = collection.iter().map(|r| r.block_count()).sum();
            let aligned: u64 = collection.iter().map(|r| r.aligned_bases()).sum();

            eprintln!("\n=== Chain Statistics ===");
            eprintln!("Records:         {}", collection.len());
            eprintln!("Blocks:          {}", blocks);
            eprintln!("Aligned bases:   {}", aligned);
            eprintln!("Malformed:       {}", collection.omitted());
            eprintln!("Score-filtered:  {}", collection.filtered());
            eprintln!("Time elapsed:    {:.2}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
