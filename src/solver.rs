//! Breadth-first search driver.
//!
//! `Search` pops states from a shared frontier, lets the pruning policy discard or narrow,
//! expands the survivors through the move generator and stops at the first solved state.
//! With `Mode::Multi` the same loop runs on a pool of scoped threads sharing the frontier,
//! the policy and a single "result found" flag.
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{ConfigError, Mode, SearchConfig};
use crate::engine::{InvariantError, State};
use crate::frontier::Frontier;
use crate::heuristics::{MoveGenerator, PruningPolicy};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("reached an impossible state")]
    Invariant(#[from] InvariantError),
    #[error("frontier exhausted without reaching a solved state")]
    FrontierExhausted,
}

/// Counters for one completed breadth-first level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelStats {
    /// Depth of the level.
    pub depth: u32,
    /// States taken from the frontier at this depth.
    pub popped: u64,
    /// Popped states the pruning policy discarded.
    pub discarded: u64,
    /// Successors pushed for the next level.
    pub pushed: u64,
    /// Wall time spent on the level.
    pub elapsed: Duration,
}

/// Result of a finished search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchOutcome {
    pub pegs: usize,
    pub disks: usize,
    /// Depth of the first solved state, i.e. the minimum number of moves.
    pub moves: u32,
    /// Number of states expanded by all workers together.
    pub expanded: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct LevelSlot {
    popped: AtomicU64,
    discarded: AtomicU64,
    pushed: AtomicU64,
}

/// Per-level counters, one slot per depth parity.
///
/// The level barrier keeps at most two adjacent depths live at once: when the first state of
/// depth `d + 1` is popped, nothing of depth `d` is still in flight. Counting into
/// `slots[depth % 2]` keeps pops of the new level out of the stats of the level being closed.
#[derive(Debug)]
struct LevelCounters {
    slots: [LevelSlot; 2],
    started: Mutex<Instant>,
}

impl LevelCounters {
    fn new(now: Instant) -> Self {
        LevelCounters {
            slots: Default::default(),
            started: Mutex::new(now),
        }
    }

    fn slot(&self, depth: u32) -> &LevelSlot {
        &self.slots[(depth % 2) as usize]
    }

    /// Reads and resets the counters of the level at `depth`.
    fn close(&self, depth: u32) -> LevelStats {
        let now = Instant::now();
        let mut started = self.started.lock().unwrap_or_else(|p| p.into_inner());
        let elapsed = now.duration_since(*started);
        *started = now;
        let slot = self.slot(depth);
        LevelStats {
            depth,
            popped: slot.popped.swap(0, Ordering::AcqRel),
            discarded: slot.discarded.swap(0, Ordering::AcqRel),
            pushed: slot.pushed.swap(0, Ordering::AcqRel),
            elapsed,
        }
    }
}

/// Releases a popped state back to the frontier when processing ends, however it ends.
///
/// If the worker is unwinding from a panic, the halt flag is raised first so the remaining
/// workers leave their loops instead of waiting on the level barrier.
struct InFlight<'a, T> {
    frontier: &'a dyn Frontier<T>,
    halted: &'a AtomicBool,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.halted.store(true, Ordering::Release);
        }
        self.frontier.task_done();
    }
}

/// A single breadth-first search over the `N`-peg, `M`-disk puzzle.
///
/// The frontier, the move generator and the pruning policy are borrowed, so several searches
/// can run side by side without sharing anything. A `Search` runs once; `run` consumes it.
///
/// # Examples
/// ```
/// use hanoi_solver::config::SearchConfig;
/// use hanoi_solver::frontier::LevelQueue;
/// use hanoi_solver::heuristics::{BasicMoves, FingerprintMemo};
/// use hanoi_solver::solver::Search;
///
/// let frontier = LevelQueue::new();
/// let memo = FingerprintMemo::new();
/// let search = Search::<3, 4, _, _, _>::new(&frontier, &BasicMoves, &memo, SearchConfig::default());
/// assert_eq!(search.run().unwrap().moves, 15);
/// ```
pub struct Search<'a, const N: usize, const M: usize, F, G, P> {
    frontier: &'a F,
    generator: &'a G,
    policy: &'a P,
    config: SearchConfig,
    /// Set by the first worker to claim a solution.
    found: AtomicBool,
    /// Observed by every blocking pop; raised on success, on errors and on panics.
    halted: AtomicBool,
    answer: OnceLock<u32>,
    level: AtomicU32,
    counters: LevelCounters,
    expanded: AtomicU64,
}

impl<'a, const N: usize, const M: usize, F, G, P> Search<'a, N, M, F, G, P>
where
    F: Frontier<State<N, M>>,
    G: MoveGenerator<N, M>,
    P: PruningPolicy<N, M>,
{
    /// Creates a search from its collaborators.
    ///
    /// # Arguments
    /// * `frontier`: An empty frontier; the search seeds it with the initial state.
    /// * `generator`: The move generator used for every expansion.
    /// * `policy`: The pruning policy consulted for every popped state.
    /// * `config`: Scheduling mode and verification settings. The pruning flags of the config
    ///   are not read here; `policy` is used as given.
    pub fn new(frontier: &'a F, generator: &'a G, policy: &'a P, config: SearchConfig) -> Self {
        Search {
            frontier,
            generator,
            policy,
            config,
            found: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            answer: OnceLock::new(),
            level: AtomicU32::new(0),
            counters: LevelCounters::new(Instant::now()),
            expanded: AtomicU64::new(0),
        }
    }

    /// Runs the search to completion.
    ///
    /// # Returns
    /// * `Ok(SearchOutcome)` with the depth of the first solved state found.
    /// * `Err(SearchError::Config)` if the configuration is rejected; nothing has been built yet.
    /// * `Err(SearchError::Invariant)` if verification is on and an impossible state turns up.
    /// * `Err(SearchError::FrontierExhausted)` if the frontier runs dry without a solution.
    ///
    /// # Panics
    /// A panic on any worker (e.g. a move generator asking to move from an empty peg) stops the
    /// other workers and is propagated to the caller.
    pub fn run(self) -> Result<SearchOutcome, SearchError> {
        self.config.validate::<N, M>()?;

        let start = Instant::now();
        *self.counters.started.lock().unwrap_or_else(|p| p.into_inner()) = start;
        info!("searching N={} M={} ({})", N, M, self.config);

        let initial = State::<N, M>::initial();
        self.policy.on_start(&initial);
        self.frontier.push(initial);

        let results: Vec<Result<(), SearchError>> = match self.config.mode {
            Mode::Single => vec![self.work(0)],
            Mode::Multi { workers } => thread::scope(|scope| {
                let this = &self;
                let handles: Vec<_> = (0..workers)
                    .map(|id| scope.spawn(move || this.work(id)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result,
                        Err(payload) => std::panic::resume_unwind(payload),
                    })
                    .collect()
            }),
        };

        self.policy.report();
        let elapsed = start.elapsed();

        // A broken invariant outranks any answer: the answer cannot be trusted.
        let mut exhausted = None;
        for result in results {
            match result {
                Err(SearchError::FrontierExhausted) => {
                    exhausted = Some(SearchError::FrontierExhausted)
                }
                Err(err) => return Err(err),
                Ok(()) => {}
            }
        }
        match self.answer.get() {
            Some(&moves) => {
                let expanded = self.expanded.load(Ordering::Acquire);
                info!(
                    "N={} M={}: {} moves, {} states expanded in {:.3}s",
                    N,
                    M,
                    moves,
                    expanded,
                    elapsed.as_secs_f64()
                );
                Ok(SearchOutcome {
                    pegs: N,
                    disks: M,
                    moves,
                    expanded,
                    elapsed,
                })
            }
            None => Err(exhausted.unwrap_or(SearchError::FrontierExhausted)),
        }
    }

    /// The loop of a single worker.
    fn work(&self, id: usize) -> Result<(), SearchError> {
        trace!("worker {} started", id);
        let result = self.work_loop(id);
        if result.is_err() {
            self.halted.store(true, Ordering::Release);
        }
        trace!("worker {} stopped", id);
        result
    }

    fn work_loop(&self, id: usize) -> Result<(), SearchError> {
        loop {
            let Some(state) = self.frontier.pop(&self.halted) else {
                if self.halted.load(Ordering::Acquire) {
                    return Ok(());
                }
                return Err(SearchError::FrontierExhausted);
            };
            let _in_flight = InFlight {
                frontier: self.frontier,
                halted: &self.halted,
            };
            self.enter_level(state.depth());
            let slot = self.counters.slot(state.depth());
            slot.popped.fetch_add(1, Ordering::Relaxed);

            if self.config.verify {
                state.check_invariants()?;
            }

            if self.policy.should_discard(&state, self.frontier) {
                slot.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let mut moves = self.generator.moves_for(&state, self.policy.commitment());
            self.policy.filter_moves(&state, &mut moves);

            if state.is_solved() {
                self.claim(id, state.depth());
                return Ok(());
            }
            if self.found.load(Ordering::Acquire) {
                return Ok(());
            }

            let pushed = moves.len() as u64;
            for mv in moves {
                self.frontier.push(state.transition(mv.from, mv.to));
            }
            slot.pushed.fetch_add(pushed, Ordering::Relaxed);
            self.expanded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records `depth` as the answer if no other worker got there first, then halts everyone.
    fn claim(&self, id: usize, depth: u32) {
        if !self.found.swap(true, Ordering::AcqRel) {
            // Only the worker that flipped the flag writes, so this cannot fail.
            let _ = self.answer.set(depth);
            debug!("worker {} found a solution at depth {}", id, depth);
        } else {
            trace!("worker {} found a solution at depth {} after another worker", id, depth);
        }
        self.halted.store(true, Ordering::Release);
    }

    /// Closes the previous level when the first state of a deeper one is popped.
    fn enter_level(&self, depth: u32) {
        let previous = self.level.fetch_max(depth, Ordering::AcqRel);
        if depth > previous {
            let stats = self.counters.close(previous);
            debug!(
                "depth {}: popped {}, discarded {}, pushed {} in {:.3}s (frontier {})",
                stats.depth,
                stats.popped,
                stats.discarded,
                stats.pushed,
                stats.elapsed.as_secs_f64(),
                self.frontier.len()
            );
            self.policy.on_level_complete(&stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Move;
    use crate::frontier::LevelQueue;
    use crate::heuristics::{
        BasicMoves, Chain, Commitment, FingerprintMemo, MoveSet, Narrowing, NoPruning,
        ShuffledMoves,
    };

    fn run_with<const N: usize, const M: usize, G, P>(
        generator: &G,
        policy: &P,
        config: SearchConfig,
    ) -> Result<SearchOutcome, SearchError>
    where
        G: MoveGenerator<N, M>,
        P: PruningPolicy<N, M>,
    {
        let frontier = LevelQueue::new();
        Search::<N, M, _, _, _>::new(&frontier, generator, policy, config).run()
    }

    fn memo_search<const N: usize, const M: usize>(config: SearchConfig) -> u32 {
        run_with::<N, M, _, _>(&BasicMoves, &FingerprintMemo::new(), config)
            .unwrap()
            .moves
    }

    #[test]
    fn test_single_disk_takes_one_move() {
        assert_eq!(memo_search::<3, 1>(SearchConfig::default()), 1);
    }

    #[test]
    fn test_three_pegs_match_closed_form() {
        let config = SearchConfig::default();
        assert_eq!(memo_search::<3, 2>(config), 3);
        assert_eq!(memo_search::<3, 3>(config), 7);
        assert_eq!(memo_search::<3, 5>(config), 31);
        assert_eq!(memo_search::<3, 10>(config), 1023);
    }

    #[test]
    fn test_without_pruning_small_instance() {
        let outcome = run_with::<3, 2, _, _>(&BasicMoves, &NoPruning, SearchConfig::default())
            .unwrap();
        assert_eq!(outcome.moves, 3);
        assert_eq!((outcome.pegs, outcome.disks), (3, 2));
        assert!(outcome.expanded > 0);
    }

    #[test]
    fn test_four_pegs_with_and_without_narrowing() {
        let expected = [1, 3, 5, 9, 13, 17, 25];
        macro_rules! check {
            ($($m:literal),*) => {$(
                let plain = memo_search::<4, $m>(SearchConfig::default());
                let policy = Chain(Narrowing::for_disks($m), FingerprintMemo::new());
                let narrowed = run_with::<4, $m, _, _>(&BasicMoves, &policy, SearchConfig::default())
                    .unwrap()
                    .moves;
                assert_eq!(plain, expected[$m - 1], "plain search, {} disks", $m);
                assert_eq!(narrowed, expected[$m - 1], "narrowed search, {} disks", $m);
            )*};
        }
        check!(1, 2, 3, 4, 5, 6, 7);
    }

    #[test]
    fn test_narrowing_expands_fewer_states() {
        let plain = run_with::<4, 7, _, _>(&BasicMoves, &FingerprintMemo::new(), SearchConfig::default())
            .unwrap();
        let policy = Chain(Narrowing::for_disks(7), FingerprintMemo::new());
        let narrowed = run_with::<4, 7, _, _>(&BasicMoves, &policy, SearchConfig::default()).unwrap();
        assert_eq!(plain.moves, narrowed.moves);
        assert!(narrowed.expanded < plain.expanded);
    }

    #[test]
    fn test_move_order_does_not_change_answer() {
        for seed in [1, 2, 3] {
            let outcome = run_with::<4, 6, _, _>(
                &ShuffledMoves { seed },
                &FingerprintMemo::new(),
                SearchConfig::default(),
            )
            .unwrap();
            assert_eq!(outcome.moves, 17, "seed {}", seed);
        }
    }

    #[test]
    fn test_multi_worker_is_repeatable() {
        let config = SearchConfig {
            mode: Mode::Multi { workers: 4 },
            ..SearchConfig::default()
        };
        for _ in 0..10 {
            assert_eq!(memo_search::<3, 4>(config), 15);
            assert_eq!(memo_search::<4, 5>(config), 13);
        }
    }

    #[test]
    fn test_multi_worker_with_narrowing() {
        for workers in [3, 8] {
            let config = SearchConfig {
                mode: Mode::Multi { workers },
                ..SearchConfig::default()
            };
            for _ in 0..5 {
                let policy = Chain(Narrowing::for_disks(6), FingerprintMemo::new());
                let outcome = run_with::<4, 6, _, _>(&BasicMoves, &policy, config).unwrap();
                assert_eq!(outcome.moves, 17, "6 disks, {} workers", workers);

                let policy = Chain(Narrowing::for_disks(7), FingerprintMemo::new());
                let outcome = run_with::<4, 7, _, _>(&BasicMoves, &policy, config).unwrap();
                assert_eq!(outcome.moves, 25, "7 disks, {} workers", workers);
            }
        }
    }

    /// Legal moves, plus a move off the empty last peg once the search reaches depth 3.
    struct Faulty;

    impl<const N: usize, const M: usize> MoveGenerator<N, M> for Faulty {
        fn moves_for(&self, state: &State<N, M>, commitment: Option<Commitment>) -> MoveSet {
            let mut moves = BasicMoves.moves_for(state, commitment);
            if state.depth() == 3 && state.peg_size(N - 1) == 0 {
                moves.push(Move::new(N - 1, N - 2));
            }
            moves
        }
    }

    #[test]
    #[should_panic(expected = "cannot move a disk from empty peg")]
    fn test_worker_panic_stops_pool_and_propagates() {
        let config = SearchConfig {
            mode: Mode::Multi { workers: 6 },
            ..SearchConfig::default()
        };
        let _ = run_with::<4, 6, _, _>(&Faulty, &NoPruning, config);
    }

    #[test]
    fn test_verify_accepts_legal_search() {
        let config = SearchConfig {
            verify: true,
            ..SearchConfig::default()
        };
        assert_eq!(memo_search::<4, 4>(config), 9);
    }

    /// Offers every move, legal or not, so verification has something to catch.
    struct Reckless;

    impl<const N: usize, const M: usize> MoveGenerator<N, M> for Reckless {
        fn moves_for(&self, state: &State<N, M>, _: Option<Commitment>) -> MoveSet {
            let mut moves = MoveSet::new();
            for from in 0..N {
                for to in 0..N {
                    if from != to && state.peg_size(from) > 0 {
                        moves.push(Move::new(from, to));
                    }
                }
            }
            moves
        }
    }

    #[test]
    fn test_verify_rejects_illegal_moves() {
        let config = SearchConfig {
            verify: true,
            ..SearchConfig::default()
        };
        let result = run_with::<3, 3, _, _>(&Reckless, &FingerprintMemo::new(), config);
        assert!(matches!(result, Err(SearchError::Invariant(_))));
    }

    /// Never offers a move, so the frontier runs dry.
    struct Stuck;

    impl<const N: usize, const M: usize> MoveGenerator<N, M> for Stuck {
        fn moves_for(&self, _: &State<N, M>, _: Option<Commitment>) -> MoveSet {
            MoveSet::new()
        }
    }

    #[test]
    fn test_empty_frontier_is_an_error() {
        let result = run_with::<3, 3, _, _>(&Stuck, &NoPruning, SearchConfig::default());
        assert!(matches!(result, Err(SearchError::FrontierExhausted)));

        let config = SearchConfig {
            mode: Mode::Multi { workers: 3 },
            ..SearchConfig::default()
        };
        let result = run_with::<3, 3, _, _>(&Stuck, &NoPruning, config);
        assert!(matches!(result, Err(SearchError::FrontierExhausted)));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_search() {
        let config = SearchConfig {
            mode: Mode::Multi { workers: 0 },
            ..SearchConfig::default()
        };
        let frontier = LevelQueue::new();
        let result = Search::<3, 2, _, _, _>::new(&frontier, &BasicMoves, &NoPruning, config).run();
        assert!(matches!(result, Err(SearchError::Config(ConfigError::NoWorkers))));
        assert!(frontier.is_empty());
    }

    /// Keeps every level reported to the policy.
    #[derive(Default)]
    struct LevelLog {
        levels: Mutex<Vec<LevelStats>>,
    }

    impl LevelLog {
        fn counts(&self) -> Vec<(u32, u64, u64)> {
            self.levels
                .lock()
                .unwrap()
                .iter()
                .map(|stats| (stats.depth, stats.popped, stats.pushed))
                .collect()
        }
    }

    impl<const N: usize, const M: usize> PruningPolicy<N, M> for LevelLog {
        fn on_level_complete(&self, stats: &LevelStats) {
            self.levels.lock().unwrap().push(*stats);
        }
    }

    #[test]
    fn test_level_stats_reported_per_depth() {
        let policy = Chain(FingerprintMemo::new(), LevelLog::default());
        let outcome = run_with::<3, 2, _, _>(&BasicMoves, &policy, SearchConfig::default()).unwrap();
        assert_eq!(outcome.moves, 3);
        // Levels 0, 1 and 2 close when the first state of the next level is popped.
        let levels = policy.1.levels.lock().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels.iter().map(|s| s.depth).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(levels[2].popped > 0);
    }

    #[test]
    fn test_level_stats_match_across_modes() {
        let single = Chain(FingerprintMemo::new(), LevelLog::default());
        run_with::<4, 5, _, _>(&BasicMoves, &single, SearchConfig::default()).unwrap();
        let expected = single.1.counts();
        assert_eq!(expected[0], (0, 1, 3));

        let config = SearchConfig {
            mode: Mode::Multi { workers: 6 },
            ..SearchConfig::default()
        };
        for _ in 0..10 {
            let multi = Chain(FingerprintMemo::new(), LevelLog::default());
            run_with::<4, 5, _, _>(&BasicMoves, &multi, config).unwrap();
            assert_eq!(multi.1.counts(), expected);
        }
    }
}
