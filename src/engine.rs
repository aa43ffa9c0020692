//! Core state encoding for the generalized Tower of Hanoi.
//!
//! This module defines the puzzle's fundamental components:
//! - `Move`: A single relocation of the top disk of one peg onto another.
//! - `State`: One packed configuration of all pegs plus the number of moves taken to reach it,
//!   with O(1) accessors, O(peg-count) successor construction and layout fingerprints.
//! - `Game`: An interactive session on top of `State` with move validation and undo history.
use rustc_hash::FxHasher;
use std::fmt;
use std::hash::Hasher;
use thiserror::Error;

/// A single move: take the top disk of peg `from` and put it on peg `to`.
///
/// A move is only meaningful against a state whose `from` peg is non-empty, and `from`
/// must differ from `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: usize,
    pub to: usize,
}

impl Move {
    /// Creates a new move from peg `from` to peg `to`.
    pub fn new(from: usize, to: usize) -> Self {
        Move { from, to }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// A broken structural invariant found by `State::check_invariants`.
///
/// Any of these means a move generator or the transition logic produced a state that
/// cannot occur in the puzzle; a search that sees one must stop rather than report a count.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantError {
    #[error("disk {disk} appears more than once")]
    DuplicateDisk { disk: u8 },
    #[error("disk {disk} is outside the range 0..{disks}")]
    UnknownDisk { disk: u8, disks: usize },
    #[error("peg sizes add up to {found}, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },
    #[error("peg {peg} starts at offset {found}, expected {expected}")]
    BadOffset { peg: usize, expected: usize, found: usize },
    #[error("disk {above} sits on smaller disk {below} on peg {peg}")]
    IllegalStack { peg: usize, below: u8, above: u8 },
}

/// One configuration of `M` disks over `N` pegs, together with its search depth.
///
/// All disks live in a single contiguous buffer: peg 0's stack first (bottom to top), then
/// peg 1's, and so on. Two small tables hold each peg's start offset inside the buffer and
/// its current size, so every accessor is a constant-time index. Offsets are an internal
/// detail and never leave this type.
///
/// Disk identifiers double as sizes: disk `M - 1` is the largest. The peg and disk counts are
/// const generics, so every instance is fixed at build time.
///
/// # Examples
/// ```
/// use hanoi_solver::engine::State;
///
/// let start = State::<3, 2>::initial();
/// assert_eq!(start.peg_size(0), 2);
/// assert_eq!(start.top_disk(0), Some(0));
///
/// let next = start.transition(0, 2);
/// assert_eq!(next.depth(), 1);
/// assert_eq!(next.top_disk(2), Some(0));
/// assert_eq!(start.peg_size(0), 2); // the parent is untouched
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct State<const N: usize, const M: usize> {
    depth: u32,
    starts: [u8; N],
    sizes: [u8; N],
    disks: [u8; M],
}

impl<const N: usize, const M: usize> State<N, M> {
    /// Compile-time guard on the instance: at least three pegs, at least one disk, and both
    /// counts small enough for the byte-wide offset tables.
    const VALID: () = assert!(
        N >= 3 && N <= u8::MAX as usize && M >= 1 && M <= u8::MAX as usize,
        "a Hanoi instance needs 3..=255 pegs and 1..=255 disks"
    );

    /// Returns the start position: depth 0, every disk on peg 0 with the largest at the bottom.
    pub fn initial() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        let mut disks = [0u8; M];
        for (pos, disk) in disks.iter_mut().enumerate() {
            *disk = (M - 1 - pos) as u8;
        }
        let mut starts = [M as u8; N];
        starts[0] = 0;
        let mut sizes = [0u8; N];
        sizes[0] = M as u8;

        State {
            depth: 0,
            starts,
            sizes,
            disks,
        }
    }

    /// Builds the state reached by moving the top disk of peg `from` onto peg `to`.
    ///
    /// The parent is only borrowed, so it stays valid for producing its other successors.
    /// The successor starts as a verbatim copy of the parent's buffer; only the disks stored
    /// between the two affected pegs slide by one slot, the moved disk lands on top of `to`,
    /// and the size and offset tables change for the pegs in that range. Disk identifiers are
    /// carried over, never recomputed.
    ///
    /// Legality (a larger disk onto a smaller one) is not checked here; move generators are
    /// responsible for only producing legal moves.
    ///
    /// # Panics
    /// Panics if `from == to`, if either index is out of range, or if peg `from` is empty.
    /// These are contract violations by the caller and must not go unnoticed.
    pub fn transition(&self, from: usize, to: usize) -> Self {
        assert!(
            from < N && to < N,
            "peg index out of range: {} -> {} with {} pegs",
            from,
            to,
            N
        );
        assert_ne!(from, to, "a move needs two distinct pegs");
        assert!(self.sizes[from] > 0, "cannot move a disk from empty peg {from}");

        let mut next = self.clone();
        next.depth = self.depth + 1;

        let src = self.starts[from] as usize + self.sizes[from] as usize - 1;
        let disk = self.disks[src];

        if from < to {
            // Everything above `src` up to the top of `to` slides one slot down.
            let dst = self.starts[to] as usize + self.sizes[to] as usize - 1;
            next.disks.copy_within(src + 1..dst + 1, src);
            next.disks[dst] = disk;
            for peg in from + 1..=to {
                next.starts[peg] -= 1;
            }
        } else {
            // Everything from just above `to` up to `src` slides one slot up.
            let dst = self.starts[to] as usize + self.sizes[to] as usize;
            next.disks.copy_within(dst..src, dst + 1);
            next.disks[dst] = disk;
            for peg in to + 1..=from {
                next.starts[peg] += 1;
            }
        }

        next.sizes[from] -= 1;
        next.sizes[to] += 1;
        next
    }

    /// Number of moves taken to reach this state.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of disks currently on peg `n`.
    ///
    /// # Panics
    /// Panics if `n >= N`.
    pub fn peg_size(&self, n: usize) -> usize {
        self.sizes[n] as usize
    }

    /// The disk at height `pos` on peg `n`, where position 0 is the bottom of the stack.
    ///
    /// # Panics
    /// Panics if `n >= N`. Positions at or beyond `peg_size(n)` are a caller error: they
    /// panic when they fall outside the buffer and otherwise read a neighbouring peg's disk.
    pub fn disk_at(&self, n: usize, pos: usize) -> u8 {
        debug_assert!(pos < self.peg_size(n), "position {pos} above the top of peg {n}");
        self.disks[self.starts[n] as usize + pos]
    }

    /// The top disk of peg `n`, or `None` when the peg is empty.
    pub fn top_disk(&self, n: usize) -> Option<u8> {
        match self.sizes[n] {
            0 => None,
            size => Some(self.disks[self.starts[n] as usize + size as usize - 1]),
        }
    }

    /// Returns `true` if the top disk of `from` may legally be placed on `to`.
    ///
    /// A move is legal when `from` is non-empty, `to` is a different peg, and `to` is either
    /// empty or topped by a larger disk.
    pub fn can_move(&self, from: usize, to: usize) -> bool {
        if from == to || from >= N || to >= N {
            return false;
        }
        match (self.top_disk(from), self.top_disk(to)) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(moving), Some(target)) => moving < target,
        }
    }

    /// Returns `true` if some peg other than the source peg 0 holds all `M` disks.
    pub fn is_solved(&self) -> bool {
        self.sizes[1..].iter().any(|&size| size as usize == M)
    }

    /// 32-bit FNV-1a hash of the peg layout.
    ///
    /// Covers the size table and the disk buffer, in order. The depth is excluded so that the
    /// same board reached at different depths hashes identically.
    pub fn fingerprint_narrow(&self) -> u32 {
        const FNV_OFFSET: u32 = 0x811c_9dc5;
        const FNV_PRIME: u32 = 0x0100_0193;

        let mut hash = FNV_OFFSET;
        for &byte in self.sizes.iter().chain(self.disks.iter()) {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// 64-bit Fx hash of the peg layout, computed independently of `fingerprint_narrow`.
    ///
    /// A layout collision has to happen on both fingerprints at once before two distinct
    /// boards are taken for the same one.
    pub fn fingerprint_wide(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(&self.sizes);
        hasher.write(&self.disks);
        hasher.finish()
    }

    /// Verifies disk conservation, the stacking rule and the consistency of the offset table.
    ///
    /// # Returns
    /// * `Ok(())` if every disk `0..M` appears exactly once, no disk sits on a smaller one, and
    ///   each peg starts where the previous one ends.
    /// * `Err(InvariantError)` describing the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let total: usize = self.sizes.iter().map(|&s| s as usize).sum();
        if total != M {
            return Err(InvariantError::SizeMismatch {
                expected: M,
                found: total,
            });
        }

        let mut expected_start = 0;
        for peg in 0..N {
            if self.starts[peg] as usize != expected_start {
                return Err(InvariantError::BadOffset {
                    peg,
                    expected: expected_start,
                    found: self.starts[peg] as usize,
                });
            }
            expected_start += self.sizes[peg] as usize;
        }

        let mut seen = [false; M];
        for &disk in &self.disks {
            let slot = seen.get_mut(disk as usize).ok_or(InvariantError::UnknownDisk {
                disk,
                disks: M,
            })?;
            if *slot {
                return Err(InvariantError::DuplicateDisk { disk });
            }
            *slot = true;
        }

        for peg in 0..N {
            for pos in 1..self.peg_size(peg) {
                let below = self.disk_at(peg, pos - 1);
                let above = self.disk_at(peg, pos);
                if above > below {
                    return Err(InvariantError::IllegalStack { peg, below, above });
                }
            }
        }
        Ok(())
    }
}

impl<const N: usize, const M: usize> fmt::Display for State<N, M> {
    /// Draws the pegs side by side, top row first, followed by a rule and the move count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = (M - 1).to_string().len();
        let height = self.sizes.iter().copied().max().unwrap_or(0) as usize;
        let rule = "-".repeat(N * (width + 1) - 1);

        for row in (0..height).rev() {
            let cells: Vec<String> = (0..N)
                .map(|peg| {
                    if row < self.peg_size(peg) {
                        format!("{:>width$}", self.disk_at(peg, row))
                    } else {
                        " ".repeat(width)
                    }
                })
                .collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        writeln!(f, "{}", rule)?;
        let labels: Vec<String> = (0..N).map(|peg| format!("{:>width$}", peg)).collect();
        write!(f, "{} | MOV: {}", labels.join(" "), self.depth)
    }
}

/// Manages an interactive Hanoi session on top of `State`.
///
/// Unlike the search, which only ever applies legal moves, a player can ask for anything.
/// `Game` validates each request before calling `State::transition`, and keeps a history of
/// states so moves can be undone.
///
/// # Examples
/// ```
/// use hanoi_solver::engine::Game;
///
/// let mut game = Game::<3, 1>::new();
/// assert!(!game.process_move(1, 2)); // peg 1 is empty
/// assert!(game.process_move(0, 2));
/// assert!(game.is_solved());
/// assert!(game.undo_last_move());
/// assert_eq!(game.steps(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Game<const N: usize, const M: usize> {
    history: Vec<State<N, M>>,
}

impl<const N: usize, const M: usize> Game<N, M> {
    /// Creates a new game at the initial position.
    pub fn new() -> Self {
        Game {
            history: vec![State::initial()],
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> &State<N, M> {
        // The initial state is never popped.
        &self.history[self.history.len() - 1]
    }

    /// Returns the number of moves made so far.
    pub fn steps(&self) -> u32 {
        self.state().depth()
    }

    /// Applies a move if it is legal.
    ///
    /// # Returns
    /// * `true` if the move was legal and has been applied.
    /// * `false` if either peg index is out of range, the pegs are equal, `from` is empty, or the
    ///   top disk of `to` is smaller than the disk being moved.
    pub fn process_move(&mut self, from: usize, to: usize) -> bool {
        if !self.state().can_move(from, to) {
            return false;
        }
        let next = self.state().transition(from, to);
        self.history.push(next);
        true
    }

    /// Reverts the last move.
    ///
    /// # Returns
    /// `false` if no move has been made yet.
    pub fn undo_last_move(&mut self) -> bool {
        if self.history.len() > 1 {
            self.history.pop();
            true
        } else {
            false
        }
    }

    /// Returns `true` once the whole stack has left peg 0 for a single other peg.
    pub fn is_solved(&self) -> bool {
        self.state().is_solved()
    }
}

impl<const N: usize, const M: usize> Default for Game<N, M> {
    fn default() -> Self {
        Self::new()
    }
}
