//! Root controller: prepare, rank, and distribute the root moves.

use std::sync::atomic::Ordering;

use shakmaty::{Chess, Position};
use tracing::debug;

use crate::limits::Limits;
use crate::options::Options;
use crate::ranker::rank_root_move;
use crate::search::control::SearchShared;
use crate::search::RootMove;
use crate::tb::TbAdapter;

/// The ranked root set, split round-robin across workers.
pub struct RootSet {
    /// One disjoint share per worker; shares of rank order `i, i+T, i+2T, …`.
    pub shares: Vec<Vec<RootMove>>,
    /// Whether the ranking came from the tablebases.
    pub root_in_tb: bool,
}

impl RootSet {
    /// Total number of ranked root moves across all shares.
    pub fn len(&self) -> usize {
        self.shares.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.iter().all(Vec::is_empty)
    }
}

/// Called just before a new search is started: generates the legal root
/// moves, filters them by `searchmoves`, ranks them (tablebase-first, else
/// the heuristic ranker), sorts them descending, and distributes them
/// round-robin across all worker threads.
pub fn init(
    pos: &Chess,
    limits: &Limits,
    options: &Options,
    tb: &TbAdapter,
    shared: &SearchShared,
    threads: usize,
) -> RootSet {
    let mut search_moves: Vec<RootMove> = pos
        .legal_moves()
        .iter()
        .filter(|m| limits.searchmoves.is_empty() || limits.searchmoves.contains(*m))
        .map(|m| RootMove::new(m.clone()))
        .collect();

    // Rank the root moves for the mate search. First, try ranking by TBs.
    let root_in_tb = tb.rank_root_moves(pos, &mut search_moves);

    if root_in_tb {
        shared
            .tb_hits(0)
            .fetch_add(search_moves.len() as u64, Ordering::Relaxed);
    } else {
        for rm in &mut search_moves {
            rm.tb_rank = rank_root_move(pos, &rm.mv);
        }
    }

    // Scores are all equal here, so this orders by descending rank
    search_moves.sort_by(|a, b| b.cmp_root(a));

    if options.root_move_stats {
        for rm in &search_moves {
            println!(
                "Root move: {}   Rank: {}",
                rm.mv.to_uci(pos.castles().mode()),
                rm.tb_rank
            );
        }
    }

    debug!(
        moves = search_moves.len(),
        root_in_tb, threads, "root moves ranked"
    );

    let mut shares: Vec<Vec<RootMove>> = (0..threads).map(|_| Vec::new()).collect();
    for (i, rm) in search_moves.into_iter().enumerate() {
        shares[i % threads].push(rm);
    }

    RootSet { shares, root_in_tb }
}
