//! Self-play data generation command line.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;

use aether::datagen::{self, packed::PackedFormat, DatagenConfig, STOP_REQUESTED};
use aether::logger;

#[derive(Parser, Debug)]
#[command(name = "datagen", about = "Generate packed self-play training data")]
struct Args {
    /// Number of games to play.
    #[arg(long, default_value_t = 100)]
    games: u64,

    /// Worker threads, each playing independent games.
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Output file for packed records.
    #[arg(long)]
    out: PathBuf,

    /// Record format: v1 (bare 32-byte records) or v2 (headered).
    #[arg(long, default_value = "v2")]
    format: String,

    /// EPD opening book, one position per line.
    #[arg(long)]
    book: Option<PathBuf>,

    /// Node budget per move (ignored when --depth is given).
    #[arg(long)]
    nodes: Option<u64>,

    /// Fixed search depth per move.
    #[arg(long)]
    depth: Option<i32>,

    /// Random opening plies before recording starts.
    #[arg(long, default_value_t = 8)]
    random_plies: u32,

    /// Adjudicate wins on sustained one-sided scores.
    #[arg(long, default_value_t = false)]
    adjudicate: bool,

    /// Hash size per worker, MiB.
    #[arg(long, default_value_t = 16)]
    hash: usize,

    /// Seed for opening randomization.
    #[arg(long, default_value_t = 0xA77E)]
    seed: u64,
}

fn main() {
    logger::init();
    let args = Args::parse();

    let format = match args.format.as_str() {
        "v1" => PackedFormat::V1,
        "v2" => PackedFormat::V2,
        other => {
            eprintln!("unknown format '{other}', expected v1 or v2");
            std::process::exit(2);
        }
    };

    // Default to a node budget when neither limit is given; depth-only
    // runs drop the node cap.
    let nodes = match (args.nodes, args.depth) {
        (None, None) => Some(40_000),
        (nodes, Some(_)) => nodes,
        (nodes, None) => nodes,
    };

    let config = DatagenConfig {
        games: args.games,
        threads: args.threads,
        out: args.out,
        format,
        book: args.book,
        nodes,
        depth: args.depth,
        random_plies: args.random_plies,
        adjudicate: args.adjudicate,
        hash_mb: args.hash,
        seed: args.seed,
    };

    ctrlc::set_handler(|| {
        STOP_REQUESTED.store(true, Ordering::Release);
        eprintln!("stopping after current games...");
    })
    .expect("failed to install SIGINT handler");

    match datagen::run(&config) {
        Ok(stats) => {
            log::info!(
                "wrote {} positions from {} games",
                stats.positions,
                stats.games
            );
        }
        Err(err) => {
            eprintln!("datagen failed: {err}");
            std::process::exit(1);
        }
    }
}
