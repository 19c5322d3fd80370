//! Proof-Number Search over an arena-backed AND/OR tree.
//!
//! The tree lives in a preallocated arena of fixed-size nodes addressed by
//! index. Index 0 is the root and doubles as the sentinel terminating every
//! sibling and child chain, since the root can never be anybody's child or
//! sibling. Solved subtrees are recycled through a FIFO queue once at least
//! 40 nodes are waiting, trading locality for predictable memory pressure.
//!
//! Each iteration runs the classic cycle: select the most-proving node,
//! expand and evaluate its children, then back-propagate proof and disproof
//! numbers to the root.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Instant;

use shakmaty::{Chess, Move, Position};

use crate::attacks::{legal_king_moves, play};
use crate::draw::{is_draw, key};
use crate::options::PNS_HASH_MAX;
use crate::ranker::score_and_rank_moves;
use crate::score::{Value, MAX_PLY, VALUE_DRAW, VALUE_MATE};
use crate::search::alphabeta::Worker;
use crate::search::uci_pv_line;
use crate::tb::WdlScore;

/// Saturating infinity for proof and disproof numbers.
pub const PNS_INFINITE: u32 = 1 << 31;

/// Arena slot index of the root/sentinel node.
const ROOT: u32 = 0;

/// One arena element of the AND/OR tree.
#[derive(Clone, Default)]
struct PnsNode {
    pn: u32,
    dn: u32,
    /// Move leading to this node; `None` only for the root.
    action: Option<Move>,
    next_sibling: u32,
    first_child: u32,
}

/// One frame of the descent stack. The parent is recorded here rather than
/// in the node, which saves per-node memory and a write on expansion.
#[derive(Clone)]
struct PnsFrame {
    pos: Chess,
    parent: u32,
    pv: Vec<Move>,
}

/// Run the Proof-Number search over the worker's root moves, sizing the
/// arena from the `PNS Hash` option (MiB).
pub fn pn_search(worker: &mut Worker, pns_hash_mib: usize) {
    let mib = pns_hash_mib.min(PNS_HASH_MAX);
    let node_count = (mib * 1024 * 1024 / std::mem::size_of::<PnsNode>()).max(256);
    pn_search_arena(worker, node_count);
}

/// Run the Proof-Number search with an explicit arena capacity.
pub fn pn_search_arena(worker: &mut Worker, node_count: usize) {
    let mut arena: Vec<PnsNode> = vec![PnsNode::default(); node_count];
    let mut fifo: VecDeque<u32> = VecDeque::new();

    let target_depth = (2 * worker.limits.mate as i32 - 1).min(MAX_PLY - 1);
    let mut frames: Vec<PnsFrame> = (0..=(target_depth + 1) as usize)
        .map(|_| PnsFrame {
            pos: worker.root_pos.clone(),
            parent: ROOT,
            pv: Vec::new(),
        })
        .collect();

    let mut keys = worker.keys.clone();
    let root_idx = worker.root_idx;

    // Counters for search statistics
    let (mut saved, mut solved, mut proven, mut disproven, mut recycled) =
        (0u64, 0u64, 0u64, 0u64, 0u64);

    // Needed for reporting a score and depth
    worker.root_depth = target_depth;
    for rm in worker.root_moves.iter_mut() {
        rm.score = VALUE_DRAW;
        rm.sel_depth = target_depth;
    }

    arena[ROOT as usize] = PnsNode {
        pn: 1,
        dn: 1,
        action: None,
        next_sibling: ROOT,
        first_child: ROOT,
    };
    saved += 1;

    let mut next_node: u32 = 1;
    let mut current: u32 = ROOT;
    let mut prev_sibling: u32 = ROOT;
    let mut ply: usize = 0;
    let mut update_pv = false;
    let mut last_output = Instant::now();

    while !worker.shared.stop() {
        // --- Step 1: selection ---------------------------------------
        //
        // Descend to the most-proving node: minimum proof number at OR
        // nodes, minimum disproof number at AND nodes. If a child carries
        // the same number as its parent it realises the parent's minimum,
        // so the sibling scan can stop there.
        while arena[current as usize].first_child != ROOT && (ply as i32) < target_depth {
            let parent_pn = arena[current as usize].pn;
            let parent_dn = arena[current as usize].dn;
            let mut child = arena[current as usize].first_child;
            let mut best = child;

            if ply & 1 == 1 {
                // AND node
                let mut min_dn = PNS_INFINITE + 1;
                while child != ROOT {
                    let c = &arena[child as usize];
                    if c.dn < min_dn {
                        min_dn = c.dn;
                        best = child;
                    }
                    if c.dn == parent_dn {
                        break;
                    }
                    child = c.next_sibling;
                }
            } else {
                // OR node
                let mut min_pn = PNS_INFINITE + 1;
                while child != ROOT {
                    let c = &arena[child as usize];
                    if c.pn < min_pn {
                        min_pn = c.pn;
                        best = child;
                    }
                    if c.pn == parent_pn {
                        break;
                    }
                    child = c.next_sibling;
                }
            }

            let action = arena[best as usize]
                .action
                .clone()
                .expect("non-root nodes carry a move");
            let child_pos = play(&frames[ply].pos, &action);
            worker.nodes.fetch_add(1, Ordering::Relaxed);
            keys.push(key(&child_pos));
            ply += 1;
            frames[ply].pos = child_pos;
            frames[ply].parent = current;
            current = best;
        }

        // --- Steps 2+3: expansion and evaluation ---------------------
        //
        // Generate the children of the most-proving node, ranked so that
        // the short-circuit at the end of the loop kicks in sooner, and
        // classify terminal positions on the spot. The proof and disproof
        // numbers flag terminal nodes; no explicit marking is needed.
        let ranked = score_and_rank_moves(&frames[ply].pos, ply as i32);
        let and_node = (ply + 1) & 1 == 1;
        let mut first_move = true;
        let mut movecount = 0;

        for lm in ranked {
            // Skip moves at the root which are not part of the root moves
            // of this worker
            if current == ROOT && !worker.root_moves.iter().any(|rm| rm.mv == lm.mv) {
                continue;
            }

            let child_pos = play(&frames[ply].pos, &lm.mv);

            // Just like in the AB search, we can skip non-checking moves
            // on frontier nodes, keeping at least one child
            if ply as i32 == target_depth - 1 && movecount > 0 && !child_pos.is_check() {
                continue;
            }

            movecount += 1;
            worker.nodes.fetch_add(1, Ordering::Relaxed);
            keys.push(key(&child_pos));
            ply += 1;
            frames[ply].pos = child_pos;

            let n = frames[ply].pos.legal_moves().len() as u32;

            // Reuse a recycled node if enough are waiting, otherwise take
            // a fresh slot
            let mut recycling = false;
            let slot = if fifo.len() >= 40 {
                recycling = true;
                recycled += 1;
                fifo.pop_front().expect("recycling bin checked non-empty")
            } else {
                next_node
            };

            // New nodes start as non-terminal internal nodes carrying the
            // number of moves necessary to prove or disprove them
            arena[slot as usize] = PnsNode {
                pn: if and_node { 1 + n } else { 1 },
                dn: if and_node { 1 } else { 1 + n },
                action: Some(lm.mv.clone()),
                next_sibling: ROOT,
                first_child: ROOT,
            };
            saved += 1;

            // Link as first child of the parent or as sibling of the
            // previously created node
            if first_move {
                arena[current as usize].first_child = slot;
            } else {
                arena[prev_sibling as usize].next_sibling = slot;
            }

            // Terminal classification
            let in_check = frames[ply].pos.is_check();
            let lone_king = frames[ply]
                .pos
                .board()
                .by_color(frames[ply].pos.turn())
                .count()
                == 1;
            let mut terminal: Option<(u32, u32)> = None;
            let mut seed_pv = false;

            if n == 0 {
                if in_check {
                    // A win for the root side, a loss otherwise
                    if and_node {
                        terminal = Some((0, PNS_INFINITE));
                        proven += 1;
                        // On reaching the specified mate distance, start a
                        // new PV line with the move leading here
                        if ply as i32 == target_depth {
                            seed_pv = true;
                        }
                    } else {
                        terminal = Some((PNS_INFINITE, 0));
                        disproven += 1;
                    }
                    solved += 1;
                } else {
                    // Treat stalemates as a loss
                    terminal = Some((PNS_INFINITE, 0));
                    solved += 1;
                    disproven += 1;
                }
            } else if and_node
                && worker.king_moves < 8
                && legal_king_moves(&frames[ply].pos) as i32 > worker.king_moves
            {
                terminal = Some((PNS_INFINITE, 0));
                solved += 1;
                disproven += 1;
            } else if !and_node && lone_king {
                // No mating material left
                terminal = Some((PNS_INFINITE, 0));
                solved += 1;
                disproven += 1;
            } else if is_draw(&frames[ply].pos, &keys, root_idx) || ply as i32 == target_depth {
                terminal = Some((PNS_INFINITE, 0));
                solved += 1;
                disproven += 1;
            } else if worker.tb.can_probe(&frames[ply].pos) {
                if let Some(wdl) = worker.tb.probe_wdl(&frames[ply].pos) {
                    worker.tb_hits.fetch_add(1, Ordering::Relaxed);
                    let disprove = match wdl {
                        WdlScore::Loss | WdlScore::BlessedLoss => !and_node,
                        WdlScore::Win | WdlScore::CursedWin => and_node,
                        WdlScore::Draw => true,
                    };
                    if disprove {
                        terminal = Some((PNS_INFINITE, 0));
                        solved += 1;
                        disproven += 1;
                    }
                }
            }

            if let Some((pn, dn)) = terminal {
                arena[slot as usize].pn = pn;
                arena[slot as usize].dn = dn;
            }
            if seed_pv {
                update_pv = true;
                frames[ply].pv.clear();
                frames[ply].pv.push(lm.mv.clone());
            }

            first_move = false;
            prev_sibling = slot;

            keys.pop();
            ply -= 1;

            let child_pn = arena[slot as usize].pn;
            let child_dn = arena[slot as usize].dn;

            if !recycling {
                next_node += 1;

                if next_node as usize + 100 >= node_count && fifo.len() < 100 {
                    println!("info string Running out of memory ...");
                    worker.shared.request_stop();
                }
                if next_node as usize >= node_count {
                    worker.shared.request_stop();
                    break;
                }
            }

            // An OR parent is proven by one proven child, an AND parent
            // disproven by one disproven child
            if (and_node && child_pn == 0) || (!and_node && child_dn == 0) {
                break;
            }
        }

        // --- Step 4: back-propagation --------------------------------
        //
        // Unwind to the root, recomputing every node on the way and
        // recycling solved subtrees.
        loop {
            let mut child = arena[current as usize].first_child;

            if ply & 1 == 1 {
                // AND node
                let mut sum_pn: u32 = 0;
                let mut min_dn: u32 = PNS_INFINITE + 1;

                while child != ROOT {
                    let (c_pn, c_dn, c_first) = {
                        let c = &arena[child as usize];
                        (c.pn, c.dn, c.first_child)
                    };
                    sum_pn = sum_pn.saturating_add(c_pn).min(PNS_INFINITE);
                    min_dn = min_dn.min(c_dn);

                    // Recycle disproven child subtrees
                    if c_pn == PNS_INFINITE && c_dn == 0 {
                        fifo.push_back(child);
                        let mut grandchild = c_first;
                        while grandchild != ROOT {
                            fifo.push_back(grandchild);
                            grandchild = arena[grandchild as usize].next_sibling;
                        }
                    }

                    child = arena[child as usize].next_sibling;
                }

                arena[current as usize].pn = sum_pn;
                arena[current as usize].dn = min_dn;
            } else {
                // OR node
                let mut min_pn: u32 = PNS_INFINITE + 1;
                let mut sum_dn: u32 = 0;

                while child != ROOT {
                    let (c_pn, c_dn, c_first) = {
                        let c = &arena[child as usize];
                        (c.pn, c.dn, c.first_child)
                    };
                    min_pn = min_pn.min(c_pn);
                    sum_dn = sum_dn.saturating_add(c_dn).min(PNS_INFINITE);

                    // Recycle proven child subtrees
                    if c_pn == 0 && c_dn == PNS_INFINITE {
                        fifo.push_back(child);
                        let mut grandchild = c_first;
                        while grandchild != ROOT {
                            fifo.push_back(grandchild);
                            grandchild = arena[grandchild as usize].next_sibling;
                        }
                    }

                    child = arena[child as usize].next_sibling;
                }

                arena[current as usize].pn = min_pn;
                arena[current as usize].dn = sum_dn;
            }

            if current == ROOT {
                break;
            }

            // Grow the PV on the way up
            if update_pv {
                let action = arena[current as usize]
                    .action
                    .clone()
                    .expect("non-root nodes carry a move");
                let (head, tail) = frames.split_at_mut(ply + 1);
                let frame = &mut head[ply];
                frame.pv.clear();
                frame.pv.push(action);
                frame.pv.extend(tail[0].pv.iter().cloned());
            }

            keys.pop();
            current = frames[ply].parent;
            ply -= 1;
        }

        // We are back at the root!
        debug_assert_eq!(current, ROOT);
        debug_assert_eq!(ply, 0);
        debug_assert_eq!(keys.len(), root_idx + 1);

        // Assign the recursively built pv to the corresponding root move
        if update_pv {
            if let Some(head) = frames[1].pv.first().cloned() {
                if let Some(rm) = worker.root_moves.iter_mut().find(|rm| rm.mv == head) {
                    if rm.pv.len() < frames[1].pv.len() {
                        rm.pv.truncate(1);
                        rm.pv.extend(frames[2].pv.iter().cloned());
                    }
                }
            }
            update_pv = false;
        }

        // Stop conditions
        if arena[ROOT as usize].pn == 0 || arena[ROOT as usize].dn == 0 {
            worker.shared.request_stop();
        } else if worker
            .limits
            .nodes
            .is_some_and(|n| worker.shared.nodes_searched() >= n)
        {
            worker.shared.request_stop();
        } else if worker
            .limits
            .movetime
            .is_some_and(|mt| worker.limits.elapsed() >= mt)
        {
            worker.shared.request_stop();
        }

        // Time for another GUI update?
        let mut give_output = false;
        if !worker.shared.stop() {
            let searched = worker.limits.elapsed().as_millis();
            let since = last_output.elapsed().as_millis();
            give_output = if searched < 2_100 {
                since >= 200
            } else if searched < 10_100 {
                since >= 1_000
            } else if searched < 60_100 {
                since >= 2_500
            } else {
                since >= 5_000
            };
            if give_output {
                last_output = Instant::now();
            }
        }

        // Update the root move stats and send info
        if worker.shared.stop() || give_output {
            // Only a proven root gets a mate score
            if arena[ROOT as usize].pn == 0 {
                let mut root_child = arena[ROOT as usize].first_child;
                while root_child != ROOT && arena[root_child as usize].pn != 0 {
                    root_child = arena[root_child as usize].next_sibling;
                }

                if root_child != ROOT {
                    if let Some(action) = arena[root_child as usize].action.clone() {
                        if let Some(rm) = worker.root_moves.iter_mut().find(|rm| rm.mv == action)
                        {
                            rm.score = VALUE_MATE - rm.pv.len() as Value;
                        }
                    }
                }
            }

            worker.root_moves.sort_by(|a, b| b.cmp_root(a));

            if !worker.shared.stop() && !worker.root_moves.is_empty() {
                println!(
                    "{}",
                    uci_pv_line(
                        target_depth,
                        &worker.root_moves[0],
                        worker.shared,
                        worker.limits,
                        worker.mode
                    )
                );
            }
        }
    }

    // Output some info about the finished search
    println!("info string Search statistics summary");
    println!(
        "Nodes: {}   solved: {}   proven: {}   disproven: {}   recycled: {}",
        saved, solved, proven, disproven, recycled
    );
}
