//! Per-move perft breakdown for move generator debugging.
//!
//! Usage: perft_divide <depth> [fen...]

use aether::board::Position;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let depth: u32 = args
        .first()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    let fen = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        aether::board::STARTPOS_FEN.to_string()
    };

    let mut pos = match Position::from_fen(&fen) {
        Ok(pos) => pos,
        Err(err) => {
            eprintln!("bad FEN: {err}");
            std::process::exit(2);
        }
    };

    let start = std::time::Instant::now();
    let mut total = 0u64;
    for &mv in pos.legal_moves().iter() {
        pos.make(mv);
        let nodes = if depth > 1 { pos.perft(depth - 1) } else { 1 };
        pos.unmake(mv);
        println!("{mv}: {nodes}");
        total += nodes;
    }
    let elapsed = start.elapsed();
    println!();
    println!(
        "perft({depth}) = {total} in {:.3}s ({:.0} Mnps)",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64().max(1e-9) / 1e6
    );
}
