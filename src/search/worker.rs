//! Search workers and the thread pool hosting them.
//!
//! One master worker (id 0) runs on the thread that called
//! [`SearchContext::search`]; helpers are long-lived threads parked on
//! a condvar between searches. Workers share the transposition table,
//! the stop flag, and the total-node counter; history tables, killers,
//! the evaluator, and the position copy are strictly per-worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::board::{Move, Piece, Position, MAX_PLY};
use crate::eval::Evaluator;
use crate::tt::TranspositionTable;

use super::{allocate_time, HistoryTables, InfoCallback, SearchLimits, SearchResult};

/// State shared by every worker of one search context.
pub struct SearchShared {
    pub tt: TranspositionTable,
    pub total_nodes: AtomicU64,
}

impl SearchShared {
    #[must_use]
    pub fn with_hash(hash_mb: usize) -> Arc<Self> {
        Arc::new(SearchShared {
            tt: TranspositionTable::new(hash_mb).expect("initial hash allocation"),
            total_nodes: AtomicU64::new(0),
        })
    }
}

/// A root move with its last-iteration score, for ordering.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RootMove {
    pub mv: Move,
    pub score: i32,
}

/// Everything one worker owns. Histories and the evaluator's pawn cache
/// live as long as the worker; per-search fields are reset by
/// [`WorkerState::prepare`].
pub struct WorkerState {
    pub id: usize,
    pub num_workers: usize,
    pub pos: Position,
    pub history: HistoryTables,
    pub evaluator: Evaluator,
    pub limits: SearchLimits,
    pub shared: Arc<SearchShared>,
    pub stop: Arc<AtomicBool>,
    pub nodes: u64,
    pub seldepth: u32,
    pub start: Instant,
    pub allocated_ms: Option<u64>,
    pub(crate) stopped: bool,
    flushed_nodes: u64,
    pub(crate) root_moves: Vec<RootMove>,
    pub(crate) moves_at: [Move; MAX_PLY],
    pub(crate) pieces_at: [Option<Piece>; MAX_PLY],
    pub info: Option<InfoCallback>,
}

impl WorkerState {
    #[must_use]
    pub fn new(id: usize, shared: Arc<SearchShared>, stop: Arc<AtomicBool>) -> Self {
        WorkerState {
            id,
            num_workers: 1,
            pos: Position::startpos(),
            history: HistoryTables::new(),
            evaluator: Evaluator::new(),
            limits: SearchLimits::default(),
            shared,
            stop,
            nodes: 0,
            seldepth: 0,
            start: Instant::now(),
            allocated_ms: None,
            stopped: false,
            flushed_nodes: 0,
            root_moves: Vec::new(),
            moves_at: [Move::null(); MAX_PLY],
            pieces_at: [None; MAX_PLY],
            info: None,
        }
    }

    /// Reset per-search state and take over the new root position.
    pub fn prepare(&mut self, job: &Job) {
        self.pos = job.pos.clone();
        self.limits = job.limits.clone();
        self.shared = Arc::clone(&job.shared);
        self.stop = Arc::clone(&job.stop);
        self.num_workers = job.num_workers;
        self.nodes = 0;
        self.flushed_nodes = 0;
        self.seldepth = 0;
        self.start = job.start;
        self.allocated_ms = job.allocated_ms;
        self.stopped = false;
        self.root_moves = job.root_moves.iter().map(|&mv| RootMove { mv, score: 0 }).collect();
        self.moves_at = [Move::null(); MAX_PLY];
        self.pieces_at = [None; MAX_PLY];
        self.history.decay();
        self.evaluator.set_contempt(job.limits.contempt);
    }

    pub(crate) fn is_master(&self) -> bool {
        self.id == 0
    }

    /// Publish locally counted nodes into the shared accumulator.
    pub(crate) fn flush_nodes(&mut self) {
        let delta = self.nodes - self.flushed_nodes;
        if delta > 0 {
            self.shared.total_nodes.fetch_add(delta, Ordering::Relaxed);
            self.flushed_nodes = self.nodes;
        }
    }
}

/// One dispatched search.
pub struct Job {
    pub pos: Position,
    pub limits: SearchLimits,
    pub shared: Arc<SearchShared>,
    pub stop: Arc<AtomicBool>,
    pub root_moves: Vec<Move>,
    pub num_workers: usize,
    pub start: Instant,
    pub allocated_ms: Option<u64>,
}

enum HelperCommand {
    Idle,
    Run(Box<Job>),
    Exit,
}

struct HelperSlot {
    command: Mutex<HelperCommand>,
    wake: Condvar,
    busy: Mutex<bool>,
    done: Condvar,
}

struct Helper {
    slot: Arc<HelperSlot>,
    handle: Option<JoinHandle<()>>,
}

/// Helper threads need room for the recursive search plus the picker
/// buffers at every ply.
const HELPER_STACK_SIZE: usize = 32 * 1024 * 1024;

fn spawn_helper(id: usize, shared: Arc<SearchShared>, stop: Arc<AtomicBool>) -> Helper {
    let slot = Arc::new(HelperSlot {
        command: Mutex::new(HelperCommand::Idle),
        wake: Condvar::new(),
        busy: Mutex::new(false),
        done: Condvar::new(),
    });
    let thread_slot = Arc::clone(&slot);

    let handle = std::thread::Builder::new()
        .name(format!("search-{id}"))
        .stack_size(HELPER_STACK_SIZE)
        .spawn(move || {
            let mut worker = WorkerState::new(id, shared, stop);
            loop {
                let job = {
                    let mut command = thread_slot.command.lock();
                    loop {
                        match std::mem::replace(&mut *command, HelperCommand::Idle) {
                            HelperCommand::Run(job) => break job,
                            HelperCommand::Exit => return,
                            HelperCommand::Idle => thread_slot.wake.wait(&mut command),
                        }
                    }
                };

                worker.prepare(&job);
                worker.iterate();

                let mut busy = thread_slot.busy.lock();
                *busy = false;
                thread_slot.done.notify_all();
            }
        })
        .expect("failed to spawn search helper");

    Helper {
        slot,
        handle: Some(handle),
    }
}

/// The long-lived helper pool. The master is not in here: it runs on
/// whichever thread drives the search.
pub struct ThreadPool {
    helpers: Vec<Helper>,
}

impl ThreadPool {
    #[must_use]
    pub fn new() -> Self {
        ThreadPool {
            helpers: Vec::new(),
        }
    }

    /// Grow or shrink to `count` helpers.
    pub fn resize(
        &mut self,
        count: usize,
        shared: &Arc<SearchShared>,
        stop: &Arc<AtomicBool>,
    ) {
        while self.helpers.len() > count {
            if let Some(helper) = self.helpers.pop() {
                shutdown_helper(helper);
            }
        }
        while self.helpers.len() < count {
            let id = self.helpers.len() + 1;
            self.helpers.push(spawn_helper(id, Arc::clone(shared), Arc::clone(stop)));
        }
    }

    pub fn kickoff(&self, job: &Job) {
        for helper in &self.helpers {
            let cloned = Job {
                pos: job.pos.clone(),
                limits: job.limits.clone(),
                shared: Arc::clone(&job.shared),
                stop: Arc::clone(&job.stop),
                root_moves: job.root_moves.clone(),
                num_workers: job.num_workers,
                start: job.start,
                allocated_ms: job.allocated_ms,
            };
            *helper.slot.busy.lock() = true;
            *helper.slot.command.lock() = HelperCommand::Run(Box::new(cloned));
            helper.slot.wake.notify_one();
        }
    }

    /// Block until every helper has finished its job.
    pub fn wait_all(&self) {
        for helper in &self.helpers {
            let mut busy = helper.slot.busy.lock();
            while *busy {
                helper.slot.done.wait(&mut busy);
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        ThreadPool::new()
    }
}

fn shutdown_helper(mut helper: Helper) {
    *helper.slot.command.lock() = HelperCommand::Exit;
    helper.slot.wake.notify_one();
    if let Some(handle) = helper.handle.take() {
        let _ = handle.join();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for helper in self.helpers.drain(..) {
            shutdown_helper(helper);
        }
    }
}

/// Owns the transposition table, the worker pool, and the master state:
/// the one value the front-ends thread through every search.
pub struct SearchContext {
    pub stop: Arc<AtomicBool>,
    shared: Arc<SearchShared>,
    pool: ThreadPool,
    master: WorkerState,
    num_threads: usize,
}

impl SearchContext {
    #[must_use]
    pub fn new(hash_mb: usize, threads: usize) -> Self {
        let shared = SearchShared::with_hash(hash_mb);
        let stop = Arc::new(AtomicBool::new(false));
        let master = WorkerState::new(0, Arc::clone(&shared), Arc::clone(&stop));
        let mut ctx = SearchContext {
            stop,
            shared,
            pool: ThreadPool::new(),
            master,
            num_threads: 1,
        };
        ctx.set_threads(threads);
        ctx
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.num_threads = threads.max(1);
        let helpers = self.num_threads - 1;
        self.pool.resize(helpers, &self.shared, &self.stop);
    }

    /// Replace the transposition table; on allocation failure the old
    /// table stays in service.
    pub fn resize_hash(&mut self, hash_mb: usize) -> bool {
        match TranspositionTable::new(hash_mb) {
            Some(tt) => {
                self.shared = Arc::new(SearchShared {
                    tt,
                    total_nodes: AtomicU64::new(0),
                });
                true
            }
            None => {
                log::warn!("hash resize to {hash_mb} MiB failed, keeping previous table");
                false
            }
        }
    }

    /// Clear the table and every ordering table (ucinewgame).
    pub fn new_game(&mut self) {
        self.shared.tt.clear();
        self.master.history.clear();
    }

    #[must_use]
    pub fn hashfull(&self) -> u32 {
        self.shared.tt.hashfull()
    }

    #[must_use]
    pub fn shared(&self) -> &Arc<SearchShared> {
        &self.shared
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Run a full search on the calling thread (which acts as the
    /// master), with helpers striping the root move list.
    pub fn search(
        &mut self,
        pos: &Position,
        limits: SearchLimits,
        info: Option<InfoCallback>,
    ) -> SearchResult {
        let mut root = pos.clone();
        let root_moves: Vec<Move> = root.legal_moves().iter().copied().collect();

        self.stop.store(false, Ordering::Release);
        self.shared.total_nodes.store(0, Ordering::Relaxed);
        self.shared.tt.new_search();

        let job = Job {
            pos: root,
            limits: limits.clone(),
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&self.stop),
            num_workers: self.num_threads,
            start: Instant::now(),
            allocated_ms: allocate_time(&limits, pos.side_to_move()),
            root_moves,
        };

        self.pool.kickoff(&job);

        self.master.prepare(&job);
        self.master.info = info;
        let result = self.master.iterate();
        self.master.info = None;

        self.stop.store(true, Ordering::Release);
        self.pool.wait_all();

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_resizes() {
        let shared = SearchShared::with_hash(1);
        let stop = Arc::new(AtomicBool::new(false));
        let mut pool = ThreadPool::new();
        pool.resize(3, &shared, &stop);
        assert_eq!(pool.len(), 3);
        pool.resize(1, &shared, &stop);
        assert_eq!(pool.len(), 1);
        pool.resize(0, &shared, &stop);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_context_searches_with_helpers() {
        let mut ctx = SearchContext::new(1, 2);
        let pos = Position::startpos();
        let limits = SearchLimits {
            depth: Some(3),
            ..SearchLimits::default()
        };
        let result = ctx.search(&pos, limits, None);
        let mv = result.best_move.expect("startpos has a best move");
        let mut check = Position::startpos();
        assert!(check.legal_moves().contains(mv));
    }

    #[test]
    fn test_stop_flag_is_sticky_between_requests() {
        let ctx = SearchContext::new(1, 1);
        ctx.request_stop();
        assert!(ctx.stop.load(Ordering::Acquire));
    }
}
