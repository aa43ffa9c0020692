use crate::engine::{Move, State};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseMovesError {
    #[error("expected '<from>-<to>', found '{0}'")]
    Format(String),
    #[error("invalid peg number in '{0}'")]
    Peg(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("move {index} ({mv}) is not legal in the current position")]
    IllegalMove { index: usize, mv: Move },
}

/// Parses a list of moves written as `<from>-<to>` pairs.
///
/// Moves are separated by whitespace and/or commas. Peg numbers are not checked against any
/// particular instance here; `replay` does that.
///
/// # Arguments
/// * `s`: The move list, e.g. `"0-2 0-1, 2-1"`.
///
/// # Returns
/// * `Ok(Vec<Move>)` with the moves in order. An empty or blank string gives an empty list.
/// * `Err(ParseMovesError)` for the first token that is not of the form `<from>-<to>`.
///
/// # Examples
/// ```
/// use hanoi_solver::engine::Move;
/// use hanoi_solver::utils::parse_moves;
///
/// assert_eq!(parse_moves("0-2, 1-0").unwrap(), vec![Move::new(0, 2), Move::new(1, 0)]);
/// assert!(parse_moves("0>2").is_err());
/// ```
pub fn parse_moves(s: &str) -> Result<Vec<Move>, ParseMovesError> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            let (from, to) = token
                .split_once('-')
                .ok_or_else(|| ParseMovesError::Format(token.to_string()))?;
            let from = from
                .parse()
                .map_err(|_| ParseMovesError::Peg(token.to_string()))?;
            let to = to
                .parse()
                .map_err(|_| ParseMovesError::Peg(token.to_string()))?;
            Ok(Move::new(from, to))
        })
        .collect()
}

/// Applies `moves` one by one from the initial state, checking each for legality.
///
/// # Returns
/// * `Ok(Vec<State>)` holding the initial state followed by the state after each move.
/// * `Err(ReplayError::IllegalMove)` for the first move that breaks the rules.
pub fn replay<const N: usize, const M: usize>(
    moves: &[Move],
) -> Result<Vec<State<N, M>>, ReplayError> {
    let mut trail = Vec::with_capacity(moves.len() + 1);
    trail.push(State::initial());
    for (index, &mv) in moves.iter().enumerate() {
        let current: &State<N, M> = &trail[trail.len() - 1];
        if !current.can_move(mv.from, mv.to) {
            return Err(ReplayError::IllegalMove { index, mv });
        }
        let next = current.transition(mv.from, mv.to);
        trail.push(next);
    }
    Ok(trail)
}

/// Move counts of the Frame–Stewart algorithm, the known upper bound for the puzzle.
///
/// Computes `FS(n, p) = min over 1 <= k < n of 2 * FS(k, p) + FS(n - k, p - 1)`, with
/// `FS(n, 3) = 2^n - 1`. For three and four pegs these are the proven optimal counts, which
/// makes them a reference for search results. Values saturate at `u64::MAX`.
///
/// # Examples
/// ```
/// use hanoi_solver::utils::frame_stewart;
/// assert_eq!(frame_stewart(3, 10), 1023);
/// assert_eq!(frame_stewart(4, 10), 49);
/// ```
///
/// # Panics
/// Panics if `pegs < 3`.
pub fn frame_stewart(pegs: usize, disks: usize) -> u64 {
    assert!(pegs >= 3, "the puzzle needs at least 3 pegs");

    // table[n] holds FS(n, p) for the peg count of the current round.
    let mut table: Vec<u64> = (0..=disks)
        .map(|n| {
            if n >= 64 {
                u64::MAX
            } else {
                (1u64 << n) - 1
            }
        })
        .collect();
    for _ in 4..=pegs {
        let fewer = table.clone();
        for n in 2..=disks {
            table[n] = (1..n)
                .map(|k| table[k].saturating_mul(2).saturating_add(fewer[n - k]))
                .min()
                .unwrap_or(fewer[n]);
        }
    }
    table[disks]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_moves_valid() {
        let moves = parse_moves("0-2 0-1,2-1\n0-2").unwrap();
        assert_eq!(
            moves,
            vec![
                Move::new(0, 2),
                Move::new(0, 1),
                Move::new(2, 1),
                Move::new(0, 2)
            ]
        );
    }

    #[test]
    fn test_parse_moves_empty_input() {
        assert_eq!(parse_moves("").unwrap(), vec![]);
        assert_eq!(parse_moves("  , ").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_moves_invalid() {
        assert_eq!(
            parse_moves("0-2 02"),
            Err(ParseMovesError::Format("02".to_string()))
        );
        assert_eq!(
            parse_moves("a-1"),
            Err(ParseMovesError::Peg("a-1".to_string()))
        );
        assert_eq!(
            parse_moves("1--2"),
            Err(ParseMovesError::Peg("1--2".to_string()))
        );
    }

    #[test]
    fn test_replay_classic_solution() {
        let moves = parse_moves("0-2 0-1 2-1 0-2 1-0 1-2 0-2").unwrap();
        let trail = replay::<3, 3>(&moves).unwrap();
        assert_eq!(trail.len(), 8);
        for (depth, state) in trail.iter().enumerate() {
            assert_eq!(state.depth(), depth as u32);
            assert!(state.check_invariants().is_ok());
        }
        assert!(trail[7].is_solved());
        assert!(trail[..7].iter().all(|s| !s.is_solved()));
    }

    #[test]
    fn test_replay_rejects_illegal_move() {
        let moves = parse_moves("0-1 0-1").unwrap();
        assert_eq!(
            replay::<3, 3>(&moves),
            Err(ReplayError::IllegalMove {
                index: 1,
                mv: Move::new(0, 1)
            })
        );
        let moves = parse_moves("0-5").unwrap();
        assert!(replay::<3, 3>(&moves).is_err());
    }

    #[test]
    fn test_frame_stewart_reference_values() {
        let three: Vec<u64> = (1..=6).map(|n| frame_stewart(3, n)).collect();
        assert_eq!(three, vec![1, 3, 7, 15, 31, 63]);
        let four: Vec<u64> = (1..=10).map(|n| frame_stewart(4, n)).collect();
        assert_eq!(four, vec![1, 3, 5, 9, 13, 17, 25, 33, 41, 49]);
        let five: Vec<u64> = (1..=7).map(|n| frame_stewart(5, n)).collect();
        assert_eq!(five, vec![1, 3, 5, 7, 11, 15, 19]);
        assert_eq!(frame_stewart(4, 0), 0);
        assert_eq!(frame_stewart(3, 100), u64::MAX);
    }
}
