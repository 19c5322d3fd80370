//! Syzygy tablebase adapter.
//!
//! A thin interface around the WDL and DTZ probes: root-move ranking
//! (DTZ first, WDL fallback), the per-node WDL decision used by both
//! searchers, and the DTZ walk that turns a basic-mate position into a
//! complete mating line without any search.

use std::sync::atomic::{AtomicU64, Ordering};

use shakmaty::{Chess, Move, Position, Role};
use shakmaty_syzygy::{AmbiguousWdl, Tablebase};
use tracing::{info, warn};

use crate::attacks::play;
use crate::options::Options;
use crate::score::{mated_in, Value, MAX_PLY, VALUE_DRAW, VALUE_MATE};
use crate::search::RootMove;

/// Five-valued outcome of a WDL probe, from the probed side's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WdlScore {
    Loss,
    BlessedLoss,
    Draw,
    CursedWin,
    Win,
}

/// Score reported for a tablebase win that has not been converted into a
/// concrete mate distance yet.
pub const VALUE_TB_WIN: Value = VALUE_MATE - MAX_PLY - 1;

/// Loaded tablebases plus the probe policy options they were opened with.
pub struct TbAdapter {
    tables: Option<Tablebase<Chess>>,
    max_cardinality: u32,
    probe_limit: u32,
    use_rule50: bool,
}

impl TbAdapter {
    /// Open the tablebases under `SyzygyPath`, if set. Multiple directories
    /// may be separated by `:` or `;`.
    pub fn new(options: &Options) -> Self {
        let mut tables = None;
        let mut max_cardinality = 0;

        if let Some(path) = options.syzygy_path.as_deref() {
            let mut tb = Tablebase::new();
            let mut files = 0usize;
            for dir in path.split([':', ';']).filter(|d| !d.is_empty()) {
                match tb.add_directory(dir) {
                    Ok(n) => files += n,
                    Err(e) => warn!(dir, error = %e, "failed to open tablebase directory"),
                }
            }
            if files > 0 {
                max_cardinality = tb.max_pieces() as u32;
                info!(files, max_cardinality, "syzygy tablebases loaded");
                tables = Some(tb);
            }
        }

        Self {
            tables,
            max_cardinality,
            probe_limit: options.syzygy_probe_limit,
            use_rule50: options.syzygy_50_move_rule,
        }
    }

    /// Adapter with no tablebases loaded; every probe fails.
    pub fn disabled() -> Self {
        Self {
            tables: None,
            max_cardinality: 0,
            probe_limit: 0,
            use_rule50: true,
        }
    }

    /// Largest piece count the loaded tables can answer for.
    pub fn max_cardinality(&self) -> u32 {
        self.max_cardinality
    }

    /// Whether `pos` is inside probe range for in-search probes.
    pub fn can_probe(&self, pos: &Chess) -> bool {
        self.tables.is_some()
            && self.max_cardinality >= pos.board().occupied().count() as u32
            && !pos.castles().any()
    }

    /// Probe WDL for the side to move. `None` means no information.
    pub fn probe_wdl(&self, pos: &Chess) -> Option<WdlScore> {
        let tables = self.tables.as_ref()?;
        match tables.probe_wdl(pos) {
            Ok(wdl) => Some(wdl_score(wdl)),
            Err(_) => None,
        }
    }

    /// Rank `root_moves` from the tablebases. Tries DTZ tables first and
    /// falls back to WDL; on a double failure all ranks are zeroed. Returns
    /// the `RootInTB` flag.
    pub fn rank_root_moves(&self, pos: &Chess, root_moves: &mut [RootMove]) -> bool {
        let mut root_in_tb = false;
        let cardinality = self.probe_limit.min(self.max_cardinality);

        if !root_moves.is_empty()
            && self.tables.is_some()
            && cardinality >= pos.board().occupied().count() as u32
            && !pos.castles().any()
        {
            root_in_tb = self.root_probe_dtz(pos, root_moves);

            if !root_in_tb {
                root_in_tb = self.root_probe_wdl(pos, root_moves);
            }
        }

        if !root_in_tb {
            for rm in root_moves.iter_mut() {
                rm.tb_rank = 0;
            }
        }

        root_in_tb
    }

    /// Rank root moves by DTZ. Higher rank = faster forced win.
    fn root_probe_dtz(&self, pos: &Chess, root_moves: &mut [RootMove]) -> bool {
        let tables = match self.tables.as_ref() {
            Some(t) => t,
            None => return false,
        };

        for rm in root_moves.iter_mut() {
            let child = play(pos, &rm.mv);

            // Distance to zeroing move from our point of view; an immediate
            // mate counts as 1.
            let dtz = if child.is_checkmate() {
                1
            } else {
                match tables.probe_dtz(&child) {
                    Ok(d) => -d.ignore_rounding().0,
                    Err(_) => return false,
                }
            };

            let cnt50 = child.halfmoves() as i32;
            rm.tb_rank = if dtz > 0 {
                if !self.use_rule50 || dtz + cnt50 <= 99 {
                    1000 - dtz
                } else {
                    900 - dtz
                }
            } else if dtz < 0 {
                if !self.use_rule50 || 2 * -dtz + cnt50 < 100 {
                    -1000 - dtz
                } else {
                    -900 - dtz
                }
            } else {
                0
            };
            rm.tb_score = tb_score_from_rank(rm.tb_rank);
        }

        true
    }

    /// Rank root moves by WDL only (DTZ tables missing).
    fn root_probe_wdl(&self, pos: &Chess, root_moves: &mut [RootMove]) -> bool {
        for rm in root_moves.iter_mut() {
            let child = play(pos, &rm.mv);

            let ours = if child.is_checkmate() {
                WdlScore::Win
            } else {
                match self.probe_wdl(&child) {
                    Some(wdl) => flip(wdl),
                    None => return false,
                }
            };

            rm.tb_rank = match ours {
                WdlScore::Win => 1000,
                WdlScore::CursedWin => {
                    if self.use_rule50 {
                        899
                    } else {
                        1000
                    }
                }
                WdlScore::Draw => 0,
                WdlScore::BlessedLoss => {
                    if self.use_rule50 {
                        -899
                    } else {
                        -1000
                    }
                }
                WdlScore::Loss => -1000,
            };
            rm.tb_score = tb_score_from_rank(rm.tb_rank);
        }

        true
    }

    /// Build a forced mating line by repeatedly playing the best DTZ-ranked
    /// move. Only called for basic-mate material, where the DTZ tables
    /// cover the whole line.
    pub fn syzygy_search(
        &self,
        pos: &Chess,
        ply: i32,
        nodes: &AtomicU64,
        tb_hits: &AtomicU64,
    ) -> (Value, Vec<Move>) {
        if ply >= MAX_PLY {
            return (VALUE_DRAW, Vec::new());
        }

        let moves = pos.legal_moves();

        // No legal moves? Must be mate!
        if moves.is_empty() {
            return (mated_in(ply), Vec::new());
        }

        let mut ranked: Vec<RootMove> = moves.iter().map(|m| RootMove::new(m.clone())).collect();
        if !self.rank_root_moves(pos, &mut ranked) {
            return (VALUE_DRAW, Vec::new());
        }
        tb_hits.fetch_add(ranked.len() as u64, Ordering::Relaxed);
        ranked.sort_by(|a, b| b.cmp_root(a));

        let best = ranked[0].mv.clone();
        nodes.fetch_add(1, Ordering::Relaxed);
        let (child_value, child_pv) = self.syzygy_search(&play(pos, &best), ply + 1, nodes, tb_hits);

        let mut pv = Vec::with_capacity(child_pv.len() + 1);
        pv.push(best);
        pv.extend(child_pv);

        (-child_value, pv)
    }
}

/// Detect a basic endgame mate: KQK, KRK, KBBK, KBNK or KNNNK for the side
/// to move. These are fully solved by walking the DTZ tables.
pub fn is_basic_mate(pos: &Chess) -> bool {
    let us = pos.turn();
    let board = pos.board();
    let ours = board.by_color(us);
    let theirs = board.by_color(us.other());

    if theirs.count() != 1 || (ours & board.by_role(Role::Pawn)).any() {
        return false;
    }

    let knights = (ours & board.by_role(Role::Knight)).count();
    let bishops = (ours & board.by_role(Role::Bishop)).count();
    let rooks = (ours & board.by_role(Role::Rook)).count();
    let queens = (ours & board.by_role(Role::Queen)).count();

    matches!(
        (queens, rooks, bishops, knights),
        (1, 0, 0, 0) | (0, 1, 0, 0) | (0, 0, 2, 0) | (0, 0, 1, 1) | (0, 0, 0, 3)
    )
}

fn wdl_score(wdl: AmbiguousWdl) -> WdlScore {
    match wdl {
        AmbiguousWdl::Loss => WdlScore::Loss,
        AmbiguousWdl::MaybeLoss | AmbiguousWdl::BlessedLoss => WdlScore::BlessedLoss,
        AmbiguousWdl::Draw => WdlScore::Draw,
        AmbiguousWdl::CursedWin | AmbiguousWdl::MaybeWin => WdlScore::CursedWin,
        AmbiguousWdl::Win => WdlScore::Win,
    }
}

/// WDL from the other side's point of view.
fn flip(wdl: WdlScore) -> WdlScore {
    match wdl {
        WdlScore::Loss => WdlScore::Win,
        WdlScore::BlessedLoss => WdlScore::CursedWin,
        WdlScore::Draw => WdlScore::Draw,
        WdlScore::CursedWin => WdlScore::BlessedLoss,
        WdlScore::Win => WdlScore::Loss,
    }
}

fn tb_score_from_rank(rank: i32) -> Value {
    if rank > 900 {
        VALUE_TB_WIN
    } else if rank < -900 {
        -VALUE_TB_WIN
    } else {
        VALUE_DRAW
    }
}
