//! Alpha-beta mate search with rank-gated pruning and check extensions.
//!
//! Classical pruning is replaced by rank gates: at shallow iterations only
//! promising moves (checks, near-checks) are searched for the mating side,
//! and frontier nodes consider checking moves only. Iterative deepening
//! proceeds in steps of two plies so the mating side is always to move at
//! the leaves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use shakmaty::{Bitboard, CastlingMode, Chess, Move, Position, Role};

use crate::attacks::{attacks_from, king_square, legal_king_moves, play};
use crate::draw::{is_draw, key};
use crate::limits::Limits;
use crate::options::Options;
use crate::ranker::score_and_rank_moves;
use crate::score::{
    mated_in, Value, MAX_PLY, VALUE_DRAW, VALUE_INFINITE, VALUE_MATE, VALUE_MATE_IN_MAX_PLY,
};
use crate::search::control::{SearchShared, TimeCheck};
use crate::search::{uci_pv_line, RootMove};
use crate::tb::{is_basic_mate, TbAdapter, WdlScore};

const DARK_SQUARES: Bitboard = Bitboard(0xAA55_AA55_AA55_AA55);

/// Per-ply frame holding the principal variation found beneath it.
#[derive(Clone, Default)]
struct Frame {
    pv: Vec<Move>,
}

/// One search worker with its own root position and root-move share.
pub struct Worker<'a> {
    pub id: usize,
    pub root_pos: Chess,
    pub root_moves: Vec<RootMove>,
    pub root_in_tb: bool,
    pub root_depth: i32,
    pub target_depth: i32,
    pub full_depth: i32,

    sel_depth: i32,
    stack: Vec<Frame>,
    /// Zobrist keys of the game history plus the current search path.
    pub(crate) keys: Vec<u64>,
    pub(crate) root_idx: usize,
    pub(crate) king_moves: i32,
    all_moves: i32,
    pub(crate) mode: CastlingMode,
    last_output: Instant,
    time_check: TimeCheck,

    pub shared: &'a SearchShared,
    pub limits: &'a Limits,
    pub tb: &'a TbAdapter,
    pub(crate) nodes: &'a AtomicU64,
    pub(crate) tb_hits: &'a AtomicU64,
}

impl<'a> Worker<'a> {
    pub fn new(
        id: usize,
        root_pos: Chess,
        game_keys: &[u64],
        root_moves: Vec<RootMove>,
        root_in_tb: bool,
        shared: &'a SearchShared,
        limits: &'a Limits,
        options: &'a Options,
        tb: &'a TbAdapter,
    ) -> Self {
        let keys: Vec<u64> = game_keys.to_vec();
        let mode = root_pos.castles().mode();
        Self {
            id,
            root_pos,
            root_moves,
            root_in_tb,
            root_depth: 1,
            target_depth: 1,
            full_depth: 1,
            sel_depth: 0,
            stack: vec![Frame::default(); (MAX_PLY + 1) as usize],
            root_idx: keys.len().saturating_sub(1),
            keys,
            king_moves: options.king_moves,
            all_moves: options.all_moves,
            mode,
            last_output: Instant::now(),
            time_check: TimeCheck::new(),
            shared,
            limits,
            tb,
            nodes: shared.nodes(id),
            tb_hits: shared.tb_hits(id),
        }
    }

    fn is_main(&self) -> bool {
        self.id == 0
    }

    /// The iterative deepening loop, run by every worker over its share of
    /// the root moves.
    pub fn search(&mut self) {
        // A basic endgame mate like KQK, KRK, KBBK, KBNK or KNNNK needs no
        // search: the mate line comes straight out of the DTZ tables.
        if self.root_in_tb
            && !self.root_moves.is_empty()
            && self.root_moves[0].tb_rank > 900
            && is_basic_mate(&self.root_pos)
        {
            if !self.is_main() {
                return;
            }

            let best = self.root_moves[0].mv.clone();
            let child = play(&self.root_pos, &best);
            self.nodes.fetch_add(1, Ordering::Relaxed);
            let (value, child_pv) = self.tb.syzygy_search(&child, 1, self.nodes, self.tb_hits);

            let rm = &mut self.root_moves[0];
            rm.score = -value;
            rm.pv.truncate(1);
            rm.pv.extend(child_pv);
            rm.sel_depth = rm.pv.len() as i32;
            return;
        }

        let mate = self.limits.mate as i32;
        self.target_depth = (2 * mate - 1).min(MAX_PLY - 1);
        self.full_depth = (self.target_depth - if mate > 5 { 4 } else { 2 }).max(1);

        // Setting alpha, beta and bestValue such that we achieve many beta
        // cutoffs on odd plies.
        let alpha = VALUE_MATE - 2 * mate;
        let beta = VALUE_INFINITE;
        let mut best_value = VALUE_MATE_IN_MAX_PLY - 1;

        self.root_depth = 1;
        loop {
            for pv_idx in 0..self.root_moves.len() {
                // Only search winning moves
                if self.root_in_tb && self.root_moves[pv_idx].tb_rank <= 0 {
                    continue;
                }

                if !self.root_in_tb && self.root_depth == 1 && self.root_moves[pv_idx].tb_rank < 5000
                {
                    continue;
                }

                self.sel_depth = 1;
                let movecount = self.shared.bump_movecount(self.root_depth);

                if self.is_main()
                    && (self.limits.elapsed().as_millis() > 300
                        || (self.root_depth == self.target_depth && self.target_depth >= 7)
                        || self.root_depth > 11)
                {
                    println!(
                        "info currmove {} currmovenumber {}",
                        self.root_moves[pv_idx].mv.to_uci(self.mode),
                        movecount
                    );
                }

                // At lower iterations, skip unpromising root moves
                if self.target_depth > 7
                    && self.root_depth > 3
                    && self.root_depth < self.target_depth
                {
                    let rank = self.root_moves[pv_idx].tb_rank;
                    if self.root_depth < self.target_depth - 4 && rank < 8000 {
                        continue;
                    } else if self.root_depth < self.target_depth - 2 && rank < 4000 {
                        continue;
                    } else if rank < 0 {
                        continue;
                    }
                }

                // Make, search and undo the root move
                let mv = self.root_moves[pv_idx].mv.clone();
                let child = play(&self.root_pos, &mv);
                self.nodes.fetch_add(1, Ordering::Relaxed);
                self.keys.push(key(&child));

                let value = -self.search_node(&child, 1, -beta, -alpha, self.root_depth - 1);

                self.keys.pop();

                self.root_moves[pv_idx].sel_depth = self.sel_depth;

                if value > best_value {
                    best_value = value;

                    let child_pv = std::mem::take(&mut self.stack[1].pv);
                    let rm = &mut self.root_moves[pv_idx];
                    rm.score = value;
                    rm.pv.truncate(1);
                    rm.pv.extend(child_pv);

                    // Sort the lines searched so far
                    self.root_moves[..=pv_idx].sort_by(|a, b| b.cmp_root(a));
                }

                // Have we found a "mate in x" within the specified limit?
                if best_value >= alpha {
                    self.shared.request_stop();
                }

                if self.shared.stop() {
                    break;
                }
            }

            if self.shared.stop() {
                break;
            }

            // Let the main thread report about the just finished depth
            if self.is_main() && self.root_depth < self.target_depth {
                self.last_output = Instant::now();
                println!(
                    "{}",
                    uci_pv_line(
                        self.root_depth,
                        &self.root_moves[0],
                        self.shared,
                        self.limits,
                        self.mode
                    )
                );

                if self.root_depth > 7 {
                    println!(
                        "info string No mate in {} found ...",
                        (self.root_depth + 1) / 2
                    );
                }
            }

            if self.root_depth == self.target_depth {
                break;
            }

            self.root_depth += 2;
        }
    }

    /// The recursive negamax body.
    fn search_node(
        &mut self,
        pos: &Chess,
        ply: i32,
        mut alpha: Value,
        beta: Value,
        depth: i32,
    ) -> Value {
        debug_assert!(-VALUE_INFINITE <= alpha && alpha < beta && beta <= VALUE_INFINITE);
        debug_assert!(ply > 0);

        // Start with a fresh pv
        self.stack[ply as usize].pv.clear();

        self.sel_depth = self.sel_depth.max(ply);

        // Check for the available remaining movetime or nodes
        if self.is_main() {
            self.time_check.check(self.limits, self.shared);
        }

        // Check for aborted search or maximum ply reached
        if self.shared.stop() || ply == MAX_PLY {
            return VALUE_DRAW;
        }

        // Output some info every full minute
        if self.is_main() && self.last_output.elapsed().as_secs() >= 60 {
            self.last_output = Instant::now();
            println!(
                "{}",
                uci_pv_line(
                    self.root_depth,
                    &self.root_moves[0],
                    self.shared,
                    self.limits,
                    self.mode
                )
            );
        }

        let in_check = pos.checkers().any();

        // At the leaves, we simply either return a mate score or zero.
        // No evaluation needed!
        if depth == 0 {
            return if in_check && pos.legal_moves().is_empty() {
                mated_in(ply)
            } else {
                VALUE_DRAW
            };
        }

        if ply & 1 == 1 {
            if self.king_moves < 8 && legal_king_moves(pos) as i32 > self.king_moves {
                return VALUE_DRAW;
            }

            if self.all_moves < 250 && pos.legal_moves().len() as i32 > self.all_moves {
                return VALUE_DRAW;
            }
        } else if pos.board().by_color(pos.turn()).count() == 1 {
            // No mating material left!
            return VALUE_DRAW;
        }

        // Check for draw by repetition
        if is_draw(pos, &self.keys, self.root_idx) {
            return VALUE_DRAW;
        }

        // Tablebase probe
        if self.tb.can_probe(pos) {
            if let Some(wdl) = self.tb.probe_wdl(pos) {
                self.tb_hits.fetch_add(1, Ordering::Relaxed);

                if ply & 1 == 1 {
                    if wdl != WdlScore::Loss && wdl != WdlScore::BlessedLoss {
                        return VALUE_DRAW;
                    }
                } else if wdl != WdlScore::Win && wdl != WdlScore::CursedWin {
                    return VALUE_DRAW;
                }
            }
        }

        let mut best_value = -VALUE_INFINITE;
        let mut move_count = 0;
        let us = pos.turn();

        let legal_moves = score_and_rank_moves(pos, ply);

        // Search all legal moves
        for lm in &legal_moves {
            let mut extension = false;

            // Extensions: not more than one, and never during the last
            // iteration.
            if depth == 1 && ply < self.target_depth - 1 && self.root_depth < self.target_depth {
                // Check extension: fires during all iterations except the
                // last one, up to the specified mate limit
                if lm.rank >= 6000 {
                    extension = true;
                }
                // Other moves are only extended during the one or two
                // iterations just before the last one
                else if self.root_depth >= self.full_depth {
                    if lm.mv.is_capture() || lm.mv.is_promotion() {
                        extension = true;
                    } else if has_ready_check(pos, &lm.mv) {
                        extension = true;
                    }
                }
            }

            // In positions with many bishops of the same color for the
            // defending side, skip bishop moves to prevent search explosion
            if ply & 1 == 1
                && depth > 1
                && move_count > 5
                && lm.mv.role() == Role::Bishop
                && (pos.board().by_color(us) & pos.board().by_role(Role::Bishop)).count() > 3
                && (pos.board().by_color(us) & pos.board().by_role(Role::Bishop) & DARK_SQUARES)
                    .any()
                    != (pos.board().by_color(us.other()) & DARK_SQUARES).any()
            {
                continue;
            }

            // At lower iterations, skip unpromising moves for the mating
            // side. Not during the first two iterations, and less the
            // closer we get to the final iteration, where nothing is
            // skipped.
            if ply & 1 == 0
                && !extension
                && move_count > 0
                && depth > 1
                && self.target_depth >= 7
                && self.root_depth > 3
                && self.root_depth < self.target_depth
            {
                if self.root_depth < self.target_depth - 4 && lm.rank < 6000 {
                    continue;
                } else if self.root_depth < self.target_depth - 2 && lm.rank < 2000 {
                    continue;
                } else if lm.rank < 0 {
                    continue;
                }
            }

            // At frontier nodes we can skip all non-checking and
            // non-extended moves
            if depth == 1 && !extension && lm.rank < 6000 {
                continue;
            }

            move_count += 1;

            let child = play(pos, &lm.mv);
            self.nodes.fetch_add(1, Ordering::Relaxed);
            self.keys.push(key(&child));

            let value = -self.search_node(
                &child,
                ply + 1,
                -beta,
                -alpha,
                depth - 1 + 2 * extension as i32,
            );

            self.keys.pop();

            // Do we have a new best value?
            if value > best_value {
                // Beta-cutoff?
                if value >= beta {
                    return value;
                }

                best_value = value;

                if value > alpha {
                    alpha = value;

                    // Reset PV and insert current best move
                    let child_pv = std::mem::take(&mut self.stack[(ply + 1) as usize].pv);
                    let frame = &mut self.stack[ply as usize].pv;
                    frame.clear();
                    frame.push(lm.mv.clone());
                    frame.extend(child_pv);
                }
            }

            // A mate within the specified limit ends the move loop early.
            // This can only happen for the root color!
            if best_value > VALUE_MATE - 2 * self.limits.mate as i32 {
                break;
            }
        }

        // No moves? Must be mate or stalemate!
        if move_count == 0 {
            best_value = if in_check { mated_in(ply) } else { VALUE_DRAW };
        }

        debug_assert!(-VALUE_INFINITE <= best_value && best_value < VALUE_INFINITE);

        best_value
    }
}

/// Whether the moved piece can reach a checking square with its next move.
fn has_ready_check(pos: &Chess, m: &Move) -> bool {
    let role = m.role();
    if !matches!(role, Role::Knight | Role::Bishop | Role::Rook | Role::Queen) {
        return false;
    }
    let occupied = pos.board().occupied();
    let their_king = king_square(pos, pos.turn().other());
    let checks = attacks_from(role, their_king, occupied);
    (attacks_from(role, m.to(), occupied) & checks).any()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::root;
    use shakmaty::fen::Fen;

    fn pos(fen: &str) -> Chess {
        fen.parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap()
    }

    /// Run a single-threaded search and return the best root move list.
    fn solve(fen: &str, mate: u32) -> (Vec<RootMove>, bool) {
        let p = pos(fen);
        let limits = Limits::mate(mate);
        let options = Options::default();
        let tb = TbAdapter::disabled();
        let shared = SearchShared::new(1);
        let keys = vec![key(&p)];

        let set = root::init(&p, &limits, &options, &tb, &shared, 1);
        let mut worker = Worker::new(
            0,
            p,
            &keys,
            set.shares.into_iter().next().unwrap(),
            set.root_in_tb,
            &shared,
            &limits,
            &options,
            &tb,
        );
        worker.search();
        (worker.root_moves, shared.stop())
    }

    fn uci(m: &Move) -> String {
        m.to_uci(CastlingMode::Standard).to_string()
    }

    #[test]
    fn finds_mate_in_one() {
        // Scholar's mate: Qxf7#
        let (rms, proved) =
            solve("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4", 1);
        assert!(proved);
        assert_eq!(uci(&rms[0].mv), "h5f7");
        assert_eq!(rms[0].score, VALUE_MATE - 1);
        assert_eq!(rms[0].pv.len(), 1);
    }

    #[test]
    fn finds_mate_in_two_rook_ladder() {
        // Two rooks: 1.Rb7 (any) 2.Ra8#
        let (rms, proved) = solve("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1", 2);
        assert!(proved);
        assert_eq!(rms[0].score, VALUE_MATE - 3);
        assert_eq!(rms[0].pv.len(), 3);
    }

    #[test]
    fn no_mate_in_one_from_quiet_position() {
        let (rms, proved) = solve("4k3/8/8/8/8/8/8/R3K3 w - - 0 1", 1);
        assert!(!proved);
        assert!(rms[0].score < VALUE_MATE_IN_MAX_PLY);
    }

    #[test]
    fn reported_line_is_a_forced_mate() {
        let (rms, proved) = solve("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1", 2);
        assert!(proved);

        // Replay the PV: every move legal, final position checkmate
        let mut p = pos("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1");
        for m in &rms[0].pv {
            assert!(p.legal_moves().contains(m), "illegal pv move {}", uci(m));
            p.play_unchecked(m);
        }
        assert!(p.is_checkmate());
    }

    #[test]
    fn deeper_cap_keeps_reported_mates() {
        // KingMoves monotonicity: the mate is still found with the cap
        // loosened to its maximum
        let p = pos("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1");
        let limits = Limits::mate(2);
        let mut options = Options::default();
        options.king_moves = 8;
        let tb = TbAdapter::disabled();
        let shared = SearchShared::new(1);
        let keys = vec![key(&p)];
        let set = root::init(&p, &limits, &options, &tb, &shared, 1);
        let mut worker = Worker::new(
            0,
            p,
            &keys,
            set.shares.into_iter().next().unwrap(),
            set.root_in_tb,
            &shared,
            &limits,
            &options,
            &tb,
        );
        worker.search();
        assert!(worker.root_moves[0].score >= VALUE_MATE_IN_MAX_PLY);
    }

    #[test]
    fn stopped_search_returns_quickly() {
        let p = pos("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1");
        let limits = Limits::mate(30);
        let options = Options::default();
        let tb = TbAdapter::disabled();
        let shared = SearchShared::new(1);
        shared.request_stop();
        let keys = vec![key(&p)];
        let set = root::init(&p, &limits, &options, &tb, &shared, 1);
        let mut worker = Worker::new(
            0,
            p,
            &keys,
            set.shares.into_iter().next().unwrap(),
            set.root_in_tb,
            &shared,
            &limits,
            &options,
            &tb,
        );
        worker.search();
        // At most the first root move is touched before the poll fires
        assert!(shared.nodes_searched() <= 1);
        assert!(worker.root_moves[0].score < VALUE_MATE_IN_MAX_PLY);
    }
}
