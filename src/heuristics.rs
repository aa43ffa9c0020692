//! Move generation and pruning policies for the breadth-first search.
//!
//! The driver in `solver` is written against two traits defined here:
//! - `MoveGenerator`: which `(from, to)` moves to try from a state, and in what order.
//! - `PruningPolicy`: which states to skip, which moves to drop, and what to report.
//!
//! Implementations:
//! - `BasicMoves` / `ShuffledMoves`: every legal move, in a fixed or a seeded-random order.
//! - `FingerprintMemo`: drops successors whose peg layout has already been reached.
//! - `Narrowing`: the four-peg heuristic that commits to an intermediate peg once it holds a
//!   computed number of disks, and collapses the frontier onto that state.
//! - `NoPruning`, `Option<P>` and `Chain<A, B>` to switch policies off and to combine them.
use dashmap::DashSet;
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::engine::{Move, State};
use crate::frontier::Frontier;
use crate::solver::LevelStats;

/// The ordered candidate moves for one state.
///
/// A `MoveSet` is produced fresh for every expanded state, may be filtered by the pruning
/// policy, and is then consumed exactly once by value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveSet {
    moves: Vec<Move>,
}

impl MoveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MoveSet {
            moves: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, mv: Move) {
        self.moves.push(mv);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Keeps only the moves for which `keep` returns `true`, preserving their order.
    pub fn retain(&mut self, keep: impl FnMut(&Move) -> bool) {
        self.moves.retain(keep);
    }

    /// Reorders the moves with the given random number generator.
    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        self.moves.shuffle(rng);
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves
    }
}

impl IntoIterator for MoveSet {
    type Item = Move;
    type IntoIter = std::vec::IntoIter<Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.moves.into_iter()
    }
}

/// A peg reserved by the narrowing heuristic.
///
/// `reserved` disks were stacked on `peg` when the commitment was made. Until the rest of
/// the disks have been gathered on another non-source peg, the reserved stack stays where it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Commitment {
    pub peg: usize,
    pub reserved: usize,
}

impl Commitment {
    /// Returns `true` if moves touching the committed peg are withheld in `state`.
    ///
    /// The peg is frozen while it still holds exactly the reserved number of disks and no other
    /// peg besides the source holds all the remaining `M - reserved` disks.
    pub fn freezes<const N: usize, const M: usize>(&self, state: &State<N, M>) -> bool {
        if state.peg_size(self.peg) != self.reserved {
            return false;
        }
        let remaining = M - self.reserved;
        !(1..N).any(|peg| peg != self.peg && state.peg_size(peg) == remaining)
    }
}

/// Produces the candidate moves of a state.
///
/// Implementations must be pure: the same state and commitment always yield the same moves
/// in the same order.
pub trait MoveGenerator<const N: usize, const M: usize>: Sync {
    fn moves_for(&self, state: &State<N, M>, commitment: Option<Commitment>) -> MoveSet;
}

/// Every legal move, ordered by source peg and then destination peg.
///
/// With a commitment in force, moves into or out of the committed peg are left out for as
/// long as `Commitment::freezes` holds.
///
/// # Examples
/// ```
/// use hanoi_solver::engine::{Move, State};
/// use hanoi_solver::heuristics::{BasicMoves, MoveGenerator};
///
/// let moves = BasicMoves.moves_for(&State::<3, 2>::initial(), None);
/// assert_eq!(moves.as_slice(), &[Move::new(0, 1), Move::new(0, 2)]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicMoves;

impl<const N: usize, const M: usize> MoveGenerator<N, M> for BasicMoves {
    fn moves_for(&self, state: &State<N, M>, commitment: Option<Commitment>) -> MoveSet {
        let frozen = commitment
            .filter(|c| c.freezes(state))
            .map(|c| c.peg);
        let mut moves = MoveSet::with_capacity(N * (N - 1));
        for from in 0..N {
            if Some(from) == frozen {
                continue;
            }
            for to in 0..N {
                if Some(to) != frozen && state.can_move(from, to) {
                    moves.push(Move::new(from, to));
                }
            }
        }
        moves
    }
}

/// The legal moves of `BasicMoves`, shuffled.
///
/// The shuffle is seeded from `seed` and the state's wide fingerprint, so the order is still a
/// pure function of the state. Breadth-first results must not depend on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShuffledMoves {
    pub seed: u64,
}

impl<const N: usize, const M: usize> MoveGenerator<N, M> for ShuffledMoves {
    fn moves_for(&self, state: &State<N, M>, commitment: Option<Commitment>) -> MoveSet {
        let mut moves = BasicMoves.moves_for(state, commitment);
        let mut rng = SmallRng::seed_from_u64(self.seed ^ state.fingerprint_wide());
        moves.shuffle(&mut rng);
        moves
    }
}

/// Decides which states and moves the search skips, and keeps the statistics about it.
///
/// Implementations are shared by every worker and may hold state across calls. Only
/// `should_discard`, `commitment` and `filter_moves` can change what the search explores;
/// the remaining hooks are for reporting and may do nothing.
pub trait PruningPolicy<const N: usize, const M: usize>: Sync {
    /// Called once with the initial state before the search starts.
    fn on_start(&self, _initial: &State<N, M>) {}

    /// Returns `true` if the popped `state` must not be expanded.
    ///
    /// A policy may also rewrite the frontier here, e.g. clear it and push a single state.
    fn should_discard(&self, _state: &State<N, M>, _frontier: &dyn Frontier<State<N, M>>) -> bool {
        false
    }

    /// The commitment move generators must honour, if any.
    fn commitment(&self) -> Option<Commitment> {
        None
    }

    /// Removes moves from `moves` before the driver expands `state`.
    fn filter_moves(&self, _state: &State<N, M>, _moves: &mut MoveSet) {}

    /// Advisory: a breadth-first level has been completely processed.
    fn on_level_complete(&self, _stats: &LevelStats) {}

    /// Advisory: the search has finished.
    fn report(&self) {}
}

/// The policy that never prunes anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPruning;

impl<const N: usize, const M: usize> PruningPolicy<N, M> for NoPruning {}

impl<const N: usize, const M: usize, P: PruningPolicy<N, M>> PruningPolicy<N, M> for Option<P> {
    fn on_start(&self, initial: &State<N, M>) {
        if let Some(policy) = self {
            policy.on_start(initial);
        }
    }

    fn should_discard(&self, state: &State<N, M>, frontier: &dyn Frontier<State<N, M>>) -> bool {
        self.as_ref()
            .map_or(false, |policy| policy.should_discard(state, frontier))
    }

    fn commitment(&self) -> Option<Commitment> {
        self.as_ref().and_then(|policy| policy.commitment())
    }

    fn filter_moves(&self, state: &State<N, M>, moves: &mut MoveSet) {
        if let Some(policy) = self {
            policy.filter_moves(state, moves);
        }
    }

    fn on_level_complete(&self, stats: &LevelStats) {
        if let Some(policy) = self {
            policy.on_level_complete(stats);
        }
    }

    fn report(&self) {
        if let Some(policy) = self {
            policy.report();
        }
    }
}

/// Two policies applied in sequence: `A` first, then `B`.
///
/// A state is discarded if either policy discards it (`B` is not asked once `A` has), and the
/// first commitment found wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct Chain<A, B>(pub A, pub B);

impl<const N: usize, const M: usize, A, B> PruningPolicy<N, M> for Chain<A, B>
where
    A: PruningPolicy<N, M>,
    B: PruningPolicy<N, M>,
{
    fn on_start(&self, initial: &State<N, M>) {
        self.0.on_start(initial);
        self.1.on_start(initial);
    }

    fn should_discard(&self, state: &State<N, M>, frontier: &dyn Frontier<State<N, M>>) -> bool {
        self.0.should_discard(state, frontier) || self.1.should_discard(state, frontier)
    }

    fn commitment(&self) -> Option<Commitment> {
        self.0.commitment().or_else(|| self.1.commitment())
    }

    fn filter_moves(&self, state: &State<N, M>, moves: &mut MoveSet) {
        self.0.filter_moves(state, moves);
        self.1.filter_moves(state, moves);
    }

    fn on_level_complete(&self, stats: &LevelStats) {
        self.0.on_level_complete(stats);
        self.1.on_level_complete(stats);
    }

    fn report(&self) {
        self.0.report();
        self.1.report();
    }
}

/// Remembers every peg layout reached so far and drops moves that lead back to one.
///
/// Layouts are keyed by both fingerprints together. Since breadth-first order reaches every
/// layout first at its smallest depth, a later arrival can never be on a shorter path.
#[derive(Debug, Default)]
pub struct FingerprintMemo {
    visited: DashSet<(u32, u64)>,
    fresh: AtomicU64,
    repeated: AtomicU64,
}

impl FingerprintMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct layouts recorded.
    pub fn unique(&self) -> usize {
        self.visited.len()
    }

    /// Number of moves dropped because their layout was already known.
    pub fn duplicates(&self) -> u64 {
        self.repeated.load(Ordering::Relaxed)
    }

    fn key<const N: usize, const M: usize>(state: &State<N, M>) -> (u32, u64) {
        (state.fingerprint_narrow(), state.fingerprint_wide())
    }
}

impl<const N: usize, const M: usize> PruningPolicy<N, M> for FingerprintMemo {
    fn on_start(&self, initial: &State<N, M>) {
        self.visited.insert(Self::key(initial));
    }

    fn filter_moves(&self, state: &State<N, M>, moves: &mut MoveSet) {
        moves.retain(|mv| {
            let next = state.transition(mv.from, mv.to);
            if self.visited.insert(Self::key(&next)) {
                self.fresh.fetch_add(1, Ordering::Relaxed);
                true
            } else {
                self.repeated.fetch_add(1, Ordering::Relaxed);
                false
            }
        });
    }

    fn on_level_complete(&self, stats: &LevelStats) {
        debug!(
            "memo after depth {}: {} layouts known, {} duplicates dropped",
            stats.depth,
            self.visited.len(),
            self.repeated.load(Ordering::Relaxed)
        );
    }

    fn report(&self) {
        let fresh = self.fresh.load(Ordering::Relaxed);
        let repeated = self.repeated.load(Ordering::Relaxed);
        let total = fresh + repeated;
        let rate = if total == 0 {
            0.0
        } else {
            repeated as f64 * 100.0 / total as f64
        };
        info!(
            "fingerprint memo: {} layouts, {} duplicates dropped ({:.1}% of generated moves)",
            self.visited.len(),
            repeated,
            rate
        );
    }
}

/// The number of disks the narrowing heuristic waits for on an intermediate peg.
///
/// Runs two counters, `left = 1` and `right = 0`, over `disks - 2` steps: whenever
/// `2^right == left` the right counter advances, otherwise the left one does. The result is
/// the final `left`, a split point of the four-peg Frame–Stewart recurrence.
///
/// # Examples
/// ```
/// use hanoi_solver::heuristics::narrowing_threshold;
/// assert_eq!(narrowing_threshold(3), 1);
/// assert_eq!(narrowing_threshold(6), 3);
/// assert_eq!(narrowing_threshold(10), 6);
/// ```
pub fn narrowing_threshold(disks: usize) -> usize {
    let mut left = 1usize;
    let mut right = 0u32;
    for _ in 1..disks.saturating_sub(1) {
        if 1usize.checked_shl(right) == Some(left) {
            right += 1;
        } else {
            left += 1;
        }
    }
    left
}

/// Commits the search to one intermediate peg once it holds `threshold` disks.
///
/// The first popped state in which some peg other than the source holds exactly `threshold`
/// disks becomes the only state of the frontier: the frontier is cleared, the state is pushed
/// back, and the current pop is discarded. From then on `commitment()` tells move generators to
/// leave that peg alone until the remaining disks have been gathered elsewhere.
///
/// This reproduces the Frame–Stewart split for four pegs. For other peg counts it is an
/// unverified heuristic and may report a longer solution than the optimum.
#[derive(Debug)]
pub struct Narrowing {
    threshold: usize,
    committed: OnceLock<Commitment>,
}

impl Narrowing {
    /// Creates the heuristic for an instance with `disks` disks.
    pub fn for_disks(disks: usize) -> Self {
        Narrowing {
            threshold: narrowing_threshold(disks),
            committed: OnceLock::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl<const N: usize, const M: usize> PruningPolicy<N, M> for Narrowing {
    fn should_discard(&self, state: &State<N, M>, frontier: &dyn Frontier<State<N, M>>) -> bool {
        if self.committed.get().is_some() {
            return false;
        }
        let Some(peg) = (1..N).find(|&peg| state.peg_size(peg) == self.threshold) else {
            return false;
        };
        let commitment = Commitment {
            peg,
            reserved: self.threshold,
        };
        if self.committed.set(commitment).is_err() {
            // Another worker committed first.
            return false;
        }
        debug!(
            "committing to peg {} with {} disks at depth {}, dropping {} pending states",
            peg,
            self.threshold,
            state.depth(),
            frontier.len()
        );
        frontier.clear();
        frontier.push(state.clone());
        true
    }

    fn commitment(&self) -> Option<Commitment> {
        self.committed.get().copied()
    }

    fn report(&self) {
        match self.committed.get() {
            Some(c) => info!("narrowing: committed to peg {} ({} disks)", c.peg, c.reserved),
            None => info!("narrowing: threshold {} never reached", self.threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::LevelQueue;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_basic_moves_initial() {
        let moves = BasicMoves.moves_for(&State::<4, 3>::initial(), None);
        assert_eq!(
            moves.as_slice(),
            &[Move::new(0, 1), Move::new(0, 2), Move::new(0, 3)]
        );
    }

    #[test]
    fn test_basic_moves_are_legal_and_complete() {
        let state = State::<4, 4>::initial()
            .transition(0, 1)
            .transition(0, 2)
            .transition(1, 2);
        // pegs: [3, 2], [], [1, 0], []
        let moves = BasicMoves.moves_for(&state, None);
        assert_eq!(
            moves.as_slice(),
            &[
                Move::new(0, 1),
                Move::new(0, 3),
                Move::new(2, 0),
                Move::new(2, 1),
                Move::new(2, 3),
            ]
        );
        for mv in moves {
            assert!(state.can_move(mv.from, mv.to));
        }
    }

    #[test]
    fn test_commitment_freezes_peg_until_rest_is_gathered() {
        let commitment = Commitment { peg: 3, reserved: 1 };
        let state = State::<4, 3>::initial().transition(0, 3);
        // pegs: [2, 1], [], [], [0]
        assert!(commitment.freezes(&state));
        let moves = BasicMoves.moves_for(&state, Some(commitment));
        assert_eq!(moves.as_slice(), &[Move::new(0, 1), Move::new(0, 2)]);

        // Gather disks 2 and 1 on peg 1; the reserved disk may move again.
        let gathered = state.transition(0, 2).transition(0, 1).transition(2, 1);
        assert!(!commitment.freezes(&gathered));
        let moves = BasicMoves.moves_for(&gathered, Some(commitment));
        assert!(moves.as_slice().contains(&Move::new(3, 1)));
    }

    #[test]
    fn test_commitment_releases_once_reserved_stack_changes() {
        let commitment = Commitment { peg: 1, reserved: 2 };
        let state = State::<4, 3>::initial().transition(0, 1);
        assert!(!commitment.freezes(&state));
    }

    #[test]
    fn test_shuffled_moves_same_set_deterministic_order() {
        let state = State::<5, 4>::initial().transition(0, 2).transition(0, 4);
        let basic = BasicMoves.moves_for(&state, None);
        let shuffled = ShuffledMoves { seed: 7 }.moves_for(&state, None);
        let again = ShuffledMoves { seed: 7 }.moves_for(&state, None);
        assert_eq!(shuffled, again);

        let mut a = basic.as_slice().to_vec();
        let mut b = shuffled.as_slice().to_vec();
        a.sort_by_key(|m| (m.from, m.to));
        b.sort_by_key(|m| (m.from, m.to));
        assert_eq!(a, b);
    }

    #[test]
    fn test_memo_drops_known_layouts() {
        let memo = FingerprintMemo::new();
        let initial = State::<3, 2>::initial();
        PruningPolicy::<3, 2>::on_start(&memo, &initial);

        let child = initial.transition(0, 1);
        let mut moves = BasicMoves.moves_for(&child, None);
        // From [1], [0], [] the move 1-0 leads back to the initial layout.
        assert!(moves.as_slice().contains(&Move::new(1, 0)));
        memo.filter_moves(&child, &mut moves);
        assert!(!moves.as_slice().contains(&Move::new(1, 0)));
        assert_eq!(memo.duplicates(), 1);
        assert_eq!(memo.unique(), 1 + moves.len());
    }

    #[test]
    fn test_memo_keeps_first_arrival_only() {
        let memo = FingerprintMemo::new();
        let initial = State::<3, 2>::initial();
        let mut first = MoveSet::new();
        first.push(Move::new(0, 2));
        memo.filter_moves(&initial, &mut first);
        assert_eq!(first.len(), 1);

        let mut second = MoveSet::new();
        second.push(Move::new(0, 2));
        memo.filter_moves(&initial, &mut second);
        assert!(second.is_empty());
    }

    #[test]
    fn test_narrowing_threshold_values() {
        let expected = [
            (1, 1),
            (2, 1),
            (3, 1),
            (4, 2),
            (5, 2),
            (6, 3),
            (7, 4),
            (8, 4),
            (9, 5),
            (10, 6),
        ];
        for (disks, threshold) in expected {
            assert_eq!(narrowing_threshold(disks), threshold, "disks = {}", disks);
        }
    }

    #[test]
    fn test_narrowing_commits_once_and_reseeds() {
        let narrowing = Narrowing::for_disks(6);
        assert_eq!(narrowing.threshold(), 3);
        let queue: LevelQueue<State<4, 6>> = LevelQueue::new();
        let stop = AtomicBool::new(false);

        let below = State::<4, 6>::initial().transition(0, 1).transition(0, 2);
        assert!(!narrowing.should_discard(&below, &queue));
        assert_eq!(PruningPolicy::<4, 6>::commitment(&narrowing), None);

        queue.push(below.clone());
        queue.push(below.transition(0, 3));
        let at_threshold = below.transition(1, 2).transition(0, 1).transition(1, 3);
        let at_threshold = at_threshold.transition(2, 1).transition(2, 3).transition(1, 3);
        assert_eq!(at_threshold.peg_size(3), 3);

        assert!(narrowing.should_discard(&at_threshold, &queue));
        assert_eq!(
            PruningPolicy::<4, 6>::commitment(&narrowing),
            Some(Commitment { peg: 3, reserved: 3 })
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(&stop), Some(at_threshold.clone()));

        // Committed: the same state is now expanded normally.
        assert!(!narrowing.should_discard(&at_threshold, &queue));
    }

    #[test]
    fn test_chain_combines_policies() {
        let chain = Chain(Some(Narrowing::for_disks(1)), Some(FingerprintMemo::new()));
        let queue: LevelQueue<State<4, 1>> = LevelQueue::new();
        let initial = State::<4, 1>::initial();
        chain.on_start(&initial);

        let solved = initial.transition(0, 2);
        assert!(chain.should_discard(&solved, &queue));
        let commitment = PruningPolicy::<4, 1>::commitment(&chain);
        assert_eq!(commitment, Some(Commitment { peg: 2, reserved: 1 }));

        let mut moves = BasicMoves.moves_for(&solved, commitment);
        chain.filter_moves(&solved, &mut moves);
        assert!(!moves.as_slice().contains(&Move::new(2, 0)));
    }

    #[test]
    fn test_disabled_policy_is_inert() {
        let policy: Option<FingerprintMemo> = None;
        let queue: LevelQueue<State<3, 2>> = LevelQueue::new();
        let state = State::<3, 2>::initial();
        assert!(!policy.should_discard(&state, &queue));
        let mut moves = BasicMoves.moves_for(&state, None);
        policy.filter_moves(&state, &mut moves);
        assert_eq!(moves.len(), 2);
        assert_eq!(PruningPolicy::<3, 2>::commitment(&NoPruning), None);
    }
}
