//! # Hanoi Solver Library
//!
//! This library finds the minimum number of moves for the Tower of Hanoi puzzle with any
//! number of pegs (the Frame–Stewart problem). Peg and disk counts are compile-time
//! parameters, so every instance gets its own fixed-size state type.
//!
//! It is used by three binaries:
//! - `hanoi_solver`: Runs the breadth-first search on a table of instances and reports the
//!   move counts.
//! - `hanoi_player`: Allows interactive play on a 4-peg, 5-disk board via the command line.
//! - `policy_evaluator`: Compares move generators and pruning policies on small instances.
//!
//! ## Modules
//! - `engine`: The packed puzzle state (`State`), moves, fingerprints, invariant checks and
//!   the interactive `Game`.
//! - `frontier`: The `Frontier` trait and the level-barrier queue shared by search workers.
//! - `heuristics`: Move generators and pruning policies (fingerprint memo, narrowing).
//! - `solver`: The breadth-first `Search` driver, single- or multi-threaded.
//! - `config`: `SearchConfig` and its validation.
//! - `utils`: Move list parsing, replays and Frame–Stewart reference numbers.

pub mod config;
pub mod engine;
pub mod frontier;
pub mod heuristics;
pub mod solver;
pub mod utils;

use log::warn;

use crate::config::SearchConfig;
use crate::frontier::LevelQueue;
use crate::heuristics::{BasicMoves, Chain, FingerprintMemo, Narrowing};
use crate::solver::{Search, SearchError, SearchOutcome};

/// Solves the `N`-peg, `M`-disk instance with the standard collaborators.
///
/// Builds a fresh `LevelQueue`, the `BasicMoves` generator and the pruning policies selected
/// by `config` (narrowing, then the fingerprint memo), and runs one `Search`.
///
/// # Examples
/// ```
/// use hanoi_solver::config::SearchConfig;
///
/// let outcome = hanoi_solver::solve::<4, 5>(&SearchConfig::default()).unwrap();
/// assert_eq!(outcome.moves, 13);
/// ```
pub fn solve<const N: usize, const M: usize>(
    config: &SearchConfig,
) -> Result<SearchOutcome, SearchError> {
    config.validate::<N, M>()?;

    let narrowing = config.narrowing_for(N).then(|| {
        if N != 4 {
            warn!(
                "narrowing is only known to be exact for 4 pegs, answers for N={} may be too large",
                N
            );
        }
        Narrowing::for_disks(M)
    });
    let memo = config.dedup.then(FingerprintMemo::new);
    let policy = Chain(narrowing, memo);

    let frontier = LevelQueue::new();
    Search::<N, M, _, _, _>::new(&frontier, &BasicMoves, &policy, *config).run()
}
