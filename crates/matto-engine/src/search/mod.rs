//! Mate search: root move model, the two searchers, and their coordinator.

pub mod alphabeta;
pub mod control;
pub mod pns;
pub mod pool;
pub mod root;

use std::cmp::Ordering;

use shakmaty::{CastlingMode, Move};

use crate::limits::Limits;
use crate::score::{uci_value, Value, VALUE_DRAW};
use self::control::SearchShared;

/// A move at the root of the search tree, with the best line found for it.
#[derive(Debug, Clone)]
pub struct RootMove {
    /// The root move itself; always equals `pv[0]`.
    pub mv: Move,
    /// Best line of play starting with this move.
    pub pv: Vec<Move>,
    pub score: Value,
    pub previous_score: Value,
    pub sel_depth: i32,
    /// Tablebase rank when `RootInTB`, heuristic rank otherwise.
    pub tb_rank: i32,
    pub tb_score: Value,
    pub best_move_count: u32,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self {
            pv: vec![mv.clone()],
            mv,
            score: VALUE_DRAW,
            previous_score: VALUE_DRAW,
            sel_depth: 0,
            tb_rank: 0,
            tb_score: VALUE_DRAW,
            best_move_count: 0,
        }
    }

    /// Ascending "goodness": primarily by score, ties broken by tbRank.
    /// Sort with `sort_by(|a, b| b.cmp_root(a))` for the descending order
    /// both searchers keep their root lists in.
    pub fn cmp_root(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.tb_rank.cmp(&other.tb_rank))
    }
}

/// Format one `info … pv …` line for the given root move.
pub(crate) fn uci_pv_line(
    depth: i32,
    rm: &RootMove,
    shared: &SearchShared,
    limits: &Limits,
    mode: CastlingMode,
) -> String {
    let elapsed = limits.elapsed_ms();
    let nodes = shared.nodes_searched();

    let mut line = format!(
        "info time {} multipv 1 depth {} seldepth {} nodes {} nps {} tbhits {} score {} pv",
        elapsed,
        depth,
        rm.sel_depth,
        nodes,
        nodes as u128 * 1000 / elapsed,
        shared.total_tb_hits(),
        uci_value(rm.score),
    );
    for m in &rm.pv {
        line.push(' ');
        line.push_str(&m.to_uci(mode).to_string());
    }
    line
}
