//! Self-play training-data generation.
//!
//! Each worker thread plays full games against itself with a private
//! search context, buffers one packed record per usable position, and
//! stamps the game outcome into the buffer before handing it to the
//! shared writer. SIGINT flips a process-wide atomic that every loop
//! observes; nothing else is touched from the signal path.

pub mod book;
pub mod packed;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::{Color, Piece, Position};
use crate::search::{SearchContext, SearchLimits, SearchResult, MATE_BOUND};

use self::book::OpeningBook;
use self::packed::{PackedFormat, PackedRecord, RecordError, RecordWriter};

/// Set by the SIGINT handler, polled by every game loop.
pub static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Score saturation for stored records; mates collapse to the cap.
const SCORE_CAP: i16 = 2000;
const MATE_CLAMP_THRESHOLD: i32 = 20000;

/// Sigmoid parameters for the stored win/draw/loss label.
const WDL_SCALE: f64 = 400.0;
const WDL_THRESHOLD: f64 = 0.70;

/// Win adjudication: this many consecutive plies with a score of this
/// magnitude (and a completed depth) end the game early.
const ADJUDICATE_SCORE: i32 = 1200;
const ADJUDICATE_STREAK: u32 = 6;
const ADJUDICATE_MIN_DEPTH: i32 = 8;

/// Draw adjudication: past this game ply, a score pinned inside the
/// band for enough consecutive plies ends the game as a draw.
const DRAW_CP: i32 = 50;
const DRAW_PLIES: u32 = 20;
const DRAW_START_PLY: u16 = 30;

/// Hard cap so a non-converging shuffle can never pin a worker.
const MAX_PLIES: u16 = 200;

#[derive(Debug, Clone)]
pub struct DatagenConfig {
    pub games: u64,
    pub threads: usize,
    pub out: PathBuf,
    pub format: PackedFormat,
    pub book: Option<PathBuf>,
    pub nodes: Option<u64>,
    pub depth: Option<i32>,
    pub random_plies: u32,
    pub adjudicate: bool,
    pub hash_mb: usize,
    pub seed: u64,
}

impl Default for DatagenConfig {
    fn default() -> Self {
        DatagenConfig {
            games: 100,
            threads: 1,
            out: PathBuf::from("data.bin"),
            format: PackedFormat::V2,
            book: None,
            nodes: Some(40_000),
            depth: None,
            random_plies: 8,
            adjudicate: false,
            hash_mb: 16,
            seed: 0xA77E,
        }
    }
}

#[derive(Debug, Default)]
pub struct DatagenStats {
    pub games: u64,
    pub positions: u64,
}

/// Draw adjudication for positions no search will ever win: bare kings
/// or minor pieces with no pawns left.
#[must_use]
pub fn is_trivial_endgame(pos: &Position) -> bool {
    let pawns = pos.pieces_of_type(Piece::Pawn);
    let majors = pos.pieces_of_type(Piece::Rook) | pos.pieces_of_type(Piece::Queen);
    if pawns.is_empty() && majors.is_empty() {
        return true;
    }
    let non_kings = pos.occupied() & !pos.pieces_of_type(Piece::King);
    non_kings.is_empty()
}

fn wdl_from_cp(score_cp: i32) -> u8 {
    let win_prob = 1.0 / (1.0 + (-f64::from(score_cp) / WDL_SCALE).exp());
    if win_prob >= WDL_THRESHOLD {
        2
    } else if win_prob <= 1.0 - WDL_THRESHOLD {
        0
    } else {
        1
    }
}

fn clamp_score(score: i32) -> i16 {
    if score.abs() >= MATE_CLAMP_THRESHOLD {
        if score > 0 {
            SCORE_CAP
        } else {
            -SCORE_CAP
        }
    } else {
        score.clamp(i32::from(-SCORE_CAP), i32::from(SCORE_CAP)) as i16
    }
}

struct SharedOutput {
    writer: Mutex<RecordWriter<BufWriter<File>>>,
    games_claimed: AtomicU64,
    games_written: AtomicU64,
    positions_written: AtomicU64,
}

/// Generate data per `config`. Blocks until the game quota is filled or
/// a stop is requested.
pub fn run(config: &DatagenConfig) -> Result<DatagenStats, RecordError> {
    let book = match &config.book {
        Some(path) => {
            let book = OpeningBook::load(path)?;
            if book.is_empty() {
                log::warn!("opening book {} has no usable lines", path.display());
                None
            } else {
                log::info!("loaded {} book positions", book.len());
                Some(Arc::new(book))
            }
        }
        None => None,
    };

    let file = File::create(&config.out)?;
    let writer = RecordWriter::new(
        BufWriter::new(file),
        config.format,
        config.format == PackedFormat::V2,
    )?;

    let output = Arc::new(SharedOutput {
        writer: Mutex::new(writer),
        games_claimed: AtomicU64::new(0),
        games_written: AtomicU64::new(0),
        positions_written: AtomicU64::new(0),
    });

    let threads = config.threads.max(1);
    let mut handles = Vec::with_capacity(threads);
    for thread_id in 0..threads {
        let config = config.clone();
        let output = Arc::clone(&output);
        let book = book.clone();
        let handle = std::thread::Builder::new()
            .name(format!("datagen-{thread_id}"))
            .stack_size(32 * 1024 * 1024)
            .spawn(move || {
                generation_loop(thread_id, &config, book.as_deref(), &output);
            })
            .expect("failed to spawn datagen worker");
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.join();
    }

    output.writer.lock().flush()?;
    Ok(DatagenStats {
        games: output.games_written.load(Ordering::Relaxed),
        positions: output.positions_written.load(Ordering::Relaxed),
    })
}

fn generation_loop(
    thread_id: usize,
    config: &DatagenConfig,
    book: Option<&OpeningBook>,
    output: &SharedOutput,
) {
    let mut rng = StdRng::seed_from_u64(
        config.seed ^ (thread_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
    );
    let mut context = SearchContext::new(config.hash_mb, 1);

    loop {
        if STOP_REQUESTED.load(Ordering::Acquire) {
            break;
        }
        let claimed = output.games_claimed.fetch_add(1, Ordering::Relaxed);
        if claimed >= config.games {
            break;
        }

        context.new_game();
        let Some((mut records, result)) = play_game(&mut context, config, book, &mut rng) else {
            // Interrupted mid-game: nothing usable to write.
            break;
        };

        for record in &mut records {
            record.set_result(result);
        }

        let mut writer = output.writer.lock();
        let mut failed = false;
        for record in &records {
            if let Err(err) = writer.write(record) {
                log::warn!("record write failed: {err}");
                failed = true;
                break;
            }
        }
        drop(writer);

        if !failed {
            output.games_written.fetch_add(1, Ordering::Relaxed);
            output
                .positions_written
                .fetch_add(records.len() as u64, Ordering::Relaxed);
        }
    }
}

/// The opening: a book line when available, then a random walk.
fn opening_position(
    config: &DatagenConfig,
    book: Option<&OpeningBook>,
    rng: &mut StdRng,
) -> Position {
    let mut pos = book
        .and_then(|b| b.pick(rng))
        .unwrap_or_else(Position::startpos);

    for _ in 0..config.random_plies {
        let moves = pos.legal_moves();
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.gen_range(0..moves.len())];
        pos.make(mv);
    }
    // A randomized line may stumble into a finished game; retry rather
    // than record garbage.
    if pos.legal_moves().is_empty() {
        return opening_position(config, book, rng);
    }
    pos
}

/// Play one game to its end. Returns the buffered records plus the
/// white-perspective result, or `None` when interrupted.
fn play_game(
    context: &mut SearchContext,
    config: &DatagenConfig,
    book: Option<&OpeningBook>,
    rng: &mut StdRng,
) -> Option<(Vec<PackedRecord>, f32)> {
    let mut pos = opening_position(config, book, rng);
    let mut records = Vec::new();
    let mut ply: u16 = pos.ply_from_root() as u16;
    let mut streak: u32 = 0;
    let mut streak_sign = 0i32;
    let mut draw_streak: u32 = 0;

    let limits = SearchLimits {
        nodes: config.nodes,
        depth: config.depth,
        ..SearchLimits::default()
    };

    let result = loop {
        if STOP_REQUESTED.load(Ordering::Acquire) {
            return None;
        }

        if ply >= MAX_PLIES {
            break 0.5;
        }
        if pos.is_fifty_move_draw() || pos.is_repetition() || is_trivial_endgame(&pos) {
            break 0.5;
        }
        let legal = pos.legal_moves();
        if legal.is_empty() {
            if pos.in_check() {
                break if pos.side_to_move() == Color::White { 0.0 } else { 1.0 };
            }
            break 0.5;
        }

        let outcome: SearchResult = context.search(&pos, limits.clone(), None);
        let Some(best) = outcome.best_move else {
            break 0.5;
        };

        let stm_score = outcome.score;
        let white_score = if pos.side_to_move() == Color::White {
            stm_score
        } else {
            -stm_score
        };

        // Filter: positions in check and non-quiet best moves teach the
        // evaluator nothing it should learn.
        let keep = !pos.in_check() && !best.is_tactical() && stm_score.abs() < MATE_BOUND;
        if keep {
            let clamped = clamp_score(stm_score);
            records.push(PackedRecord::from_position(
                &pos,
                clamped,
                wdl_from_cp(i32::from(clamped)),
                outcome.depth.clamp(0, 255) as u8,
                best,
                ply,
            ));
        }

        // Win adjudication on a sustained, deep, one-sided score; draw
        // adjudication once a long-settled game stays inside the band.
        if config.adjudicate && outcome.depth >= ADJUDICATE_MIN_DEPTH {
            let sign = white_score.signum();
            if white_score.abs() >= ADJUDICATE_SCORE && sign == streak_sign {
                streak += 1;
            } else {
                streak = u32::from(white_score.abs() >= ADJUDICATE_SCORE);
                streak_sign = sign;
            }
            if streak >= ADJUDICATE_STREAK {
                break if streak_sign > 0 { 1.0 } else { 0.0 };
            }

            if ply >= DRAW_START_PLY {
                if i32::from(clamp_score(stm_score)).abs() <= DRAW_CP {
                    draw_streak += 1;
                } else {
                    draw_streak = 0;
                }
                if draw_streak >= DRAW_PLIES {
                    break 0.5;
                }
            }
        }

        // A forced mate on the board ends the game shortly anyway.
        if stm_score.abs() >= MATE_BOUND && config.adjudicate {
            let winner_is_white = (stm_score > 0) == (pos.side_to_move() == Color::White);
            break if winner_is_white { 1.0 } else { 0.0 };
        }

        pos.make(best);
        ply = ply.saturating_add(1);
    };

    Some((records, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_endgames() {
        let bare = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(is_trivial_endgame(&bare));
        let minors = Position::from_fen("4k3/8/8/8/8/8/8/2B1K1N1 w - - 0 1").unwrap();
        assert!(is_trivial_endgame(&minors));
        let pawn = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        assert!(!is_trivial_endgame(&pawn));
        let rook = Position::from_fen("4k3/8/8/8/8/8/8/3RK3 w - - 0 1").unwrap();
        assert!(!is_trivial_endgame(&rook));
    }

    #[test]
    fn test_wdl_sigmoid_bands() {
        assert_eq!(wdl_from_cp(0), 1);
        assert_eq!(wdl_from_cp(200), 1);
        assert_eq!(wdl_from_cp(600), 2);
        assert_eq!(wdl_from_cp(-600), 0);
        assert_eq!(wdl_from_cp(2000), 2);
    }

    #[test]
    fn test_score_clamp() {
        assert_eq!(clamp_score(123), 123);
        assert_eq!(clamp_score(5000), 2000);
        assert_eq!(clamp_score(-5000), -2000);
        assert_eq!(clamp_score(31000 - 3), 2000);
        assert_eq!(clamp_score(-(31000 - 3)), -2000);
    }

    #[test]
    fn test_games_terminate_within_the_ply_cap() {
        let config = DatagenConfig {
            depth: Some(1),
            nodes: None,
            random_plies: 0,
            adjudicate: false,
            ..DatagenConfig::default()
        };
        let mut context = SearchContext::new(4, 1);
        let mut rng = StdRng::seed_from_u64(9);
        let (records, result) =
            play_game(&mut context, &config, None, &mut rng).expect("uninterrupted game");
        assert!(records.len() <= usize::from(MAX_PLIES));
        assert!((0.0..=1.0).contains(&result));
    }

    #[test]
    fn test_opening_position_is_playable() {
        let config = DatagenConfig {
            random_plies: 6,
            ..DatagenConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10 {
            let mut pos = opening_position(&config, None, &mut rng);
            assert!(!pos.legal_moves().is_empty());
            assert!(pos.is_consistent());
        }
    }
}
