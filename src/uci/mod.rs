//! The UCI front-end: a line loop on stdin driving the search context.
//!
//! Searches run on a background thread so `stop` and `quit` stay
//! responsive; the master worker inside the context does all `info`
//! printing through a callback and the loop prints the final
//! `bestmove`.

mod command;
mod options;

pub use command::{parse_command, GoParams, UciCommand};
pub use options::{EngineOptions, OptionEffect};

use std::io::BufRead;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::board::{Move, Position};
use crate::search::{mate_distance, InfoCallback, IterationInfo, SearchContext};

/// Worker threads recurse deeply; the search thread gets the same stack
/// headroom as pool helpers.
const SEARCH_THREAD_STACK: usize = 32 * 1024 * 1024;

pub struct UciState {
    position: Position,
    options: EngineOptions,
    context: Arc<Mutex<SearchContext>>,
    stop: Arc<AtomicBool>,
    search_thread: Option<JoinHandle<()>>,
}

impl UciState {
    #[must_use]
    pub fn new() -> Self {
        let options = EngineOptions::default();
        let context = SearchContext::new(options.hash_mb, options.threads);
        let stop = Arc::clone(&context.stop);
        UciState {
            position: Position::startpos(),
            options,
            context: Arc::new(Mutex::new(context)),
            stop,
            search_thread: None,
        }
    }

    /// Signal the running search (if any) and wait for it to finish.
    fn join_search(&mut self) {
        use std::sync::atomic::Ordering;
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.search_thread.take() {
            let _ = handle.join();
        }
    }

    fn handle_position(&mut self, fen: Option<&str>, moves: &[String]) {
        let chess960 = self.options.chess960;
        match fen {
            Some(fen) => {
                if let Err(err) = self.position.set_fen(fen) {
                    log::warn!("ignoring position command: {err}");
                    self.position = Position::startpos();
                    return;
                }
            }
            None => self.position = Position::startpos(),
        }
        self.position.set_chess960(chess960 || self.position.is_chess960());
        self.position
            .apply_uci_moves(moves.iter().map(String::as_str));
    }

    fn handle_go(&mut self, params: GoParams) {
        self.join_search();

        let limits = params.into_limits(self.options.base_limits());
        let position = self.position.clone();
        let context = Arc::clone(&self.context);

        let handle = std::thread::Builder::new()
            .name("search-main".into())
            .stack_size(SEARCH_THREAD_STACK)
            .spawn(move || {
                let info: InfoCallback = Arc::new(print_info_line);
                let result = context.lock().search(&position, limits, Some(info));
                match result.best_move {
                    Some(mv) => println!("bestmove {mv}"),
                    None => println!("bestmove 0000"),
                }
            })
            .expect("failed to spawn search thread");
        self.search_thread = Some(handle);
    }

    fn handle_setoption(&mut self, name: &str, value: Option<&str>) {
        self.join_search();
        match self.options.apply(name, value) {
            OptionEffect::ResizeHash => {
                self.context.lock().resize_hash(self.options.hash_mb);
            }
            OptionEffect::SetThreads => {
                self.context.lock().set_threads(self.options.threads);
            }
            OptionEffect::ReloadTablebases => {
                // The probing adapter is an external collaborator; the
                // path is validated and remembered for it here.
                match &self.options.syzygy_path {
                    Some(path) if !std::path::Path::new(path).is_dir() => {
                        log::warn!("SyzygyPath '{path}' is not a directory");
                    }
                    Some(path) => log::info!("tablebase path set to {path}"),
                    None => log::info!("tablebase path cleared"),
                }
            }
            OptionEffect::SetChess960 => {
                self.position.set_chess960(self.options.chess960);
            }
            OptionEffect::None => {}
        }
    }

    /// Process one line; returns `false` when the loop should exit.
    pub fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = parse_command(line) else {
            return true;
        };

        match command {
            UciCommand::Uci => self.options.print_uci(),
            UciCommand::IsReady => println!("readyok"),
            UciCommand::NewGame => {
                self.join_search();
                self.context.lock().new_game();
                self.position = Position::startpos();
            }
            UciCommand::Position { fen, moves } => {
                self.handle_position(fen.as_deref(), &moves);
            }
            UciCommand::Go(params) => self.handle_go(params),
            UciCommand::SetOption { name, value } => {
                self.handle_setoption(&name, value.as_deref());
            }
            UciCommand::Stop => {
                use std::sync::atomic::Ordering;
                self.stop.store(true, Ordering::Release);
            }
            UciCommand::Quit => {
                self.join_search();
                return false;
            }
            UciCommand::Display => {
                println!("info string fen {}", self.position.to_fen());
            }
            UciCommand::Perft(depth) => {
                let start = std::time::Instant::now();
                let nodes = self.position.clone().perft(depth);
                let ms = start.elapsed().as_millis();
                println!("info string perft({depth}) = {nodes} ({ms} ms)");
            }
        }
        true
    }
}

impl Default for UciState {
    fn default() -> Self {
        UciState::new()
    }
}

fn format_score(score: i32) -> String {
    match mate_distance(score) {
        Some(mate) => format!("mate {mate}"),
        None => format!("cp {score}"),
    }
}

fn print_info_line(info: &IterationInfo) {
    let pv = info
        .pv
        .iter()
        .map(Move::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "info depth {} seldepth {} score {} nodes {} time {} nps {} hashfull {} pv {}",
        info.depth,
        info.seldepth,
        format_score(info.score),
        info.nodes,
        info.time_ms,
        info.nps,
        info.hashfull,
        pv
    );
}

/// Blocking stdin loop; returns on `quit` or end of input.
pub fn run() {
    let stdin = std::io::stdin();
    let mut state = UciState::new();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !state.handle_line(&line) {
            break;
        }
    }
}
