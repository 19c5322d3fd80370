//! Draw detection relative to a search path.
//!
//! Each worker carries a stack of Zobrist keys: the game history replayed by
//! the `position` command, followed by the moves of the current search path.
//! A repetition counts as a draw immediately when the earlier occurrence lies
//! inside the search path, and only on the second repetition when it lies in
//! the game history.

use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode, Position};

/// Zobrist key of a position.
pub fn key(pos: &Chess) -> u64 {
    let z: Zobrist64 = pos.zobrist_hash(EnPassantMode::Legal);
    z.0
}

/// Whether the position at the top of `keys` is a draw by repetition or by
/// the fifty-move rule.
///
/// `keys` holds the key of every position from the start of the game up to
/// and including `pos`; `root_idx` indexes the search root's key within it.
pub fn is_draw(pos: &Chess, keys: &[u64], root_idx: usize) -> bool {
    // Fifty-move rule. A mate on the hundredth halfmove still counts as mate.
    if pos.halfmoves() >= 100
        && (pos.checkers().is_empty() || !pos.legal_moves().is_empty())
    {
        return true;
    }

    let end = keys.len() - 1;
    let window = (pos.halfmoves() as usize).min(end);
    let mut found = false;

    let mut back = 4;
    while back <= window {
        let i = end - back;
        if keys[i] == keys[end] {
            if i > root_idx || found {
                return true;
            }
            found = true;
        }
        back += 2;
    }

    false
}
