//! Search coordinator: worker threads, early exit, final report.
//!
//! Workers share nothing but the stop flag and their counters: each owns a
//! copy of the root position and a disjoint share of the ranked root moves.
//! Uses `std::thread::scope`, so worker state borrows straight from the
//! caller. The first worker to prove a mate within the limit raises `stop`
//! and everybody returns at their next poll.

use shakmaty::{Chess, Position};
use tracing::{debug, info};

use crate::limits::Limits;
use crate::options::Options;
use crate::perft;
use crate::score::{uci_value, Value, VALUE_MATE, VALUE_MATE_IN_MAX_PLY};
use crate::search::alphabeta::Worker;
use crate::search::control::SearchShared;
use crate::search::{pns, root, uci_pv_line};
use crate::tb::TbAdapter;

/// Run one `go` invocation to completion, printing all `info` lines and the
/// final `bestmove` to stdout.
///
/// `game_keys` holds the Zobrist keys of the game history up to and
/// including `pos`, for repetition detection; `shared` must be fresh and is
/// also the caller's handle for stopping the search from another thread.
pub fn go(
    pos: &Chess,
    game_keys: &[u64],
    limits: &Limits,
    options: &Options,
    tb: &TbAdapter,
    shared: &SearchShared,
) {
    // Special case 1: 'go perft x'
    if let Some(depth) = limits.perft {
        let nodes = perft::perft_root(pos, depth);
        println!("\nNodes searched: {}\n", nodes);
        return;
    }

    let threads = options.threads.max(1);
    let set = root::init(pos, limits, options, tb, shared, threads);

    // Special case 2: no move(s) to search, must be mate or stalemate
    if set.is_empty() {
        let score: Value = if pos.checkers().any() { -VALUE_MATE } else { 0 };
        println!("info depth 0 score {}", uci_value(score));
        println!("bestmove 0000");
        return;
    }

    let root_in_tb = set.root_in_tb;
    let mut shares = set.shares.into_iter();
    let mut finished: Vec<Worker> = Vec::with_capacity(threads);

    if options.proof_number_search {
        // PNS runs single-threaded on the main worker; the other shares
        // stay idle.
        println!("info string Starting Proof-Number Search ...");
        info!(mate = limits.mate, "proof-number search starting");

        let mut worker = Worker::new(
            0,
            pos.clone(),
            game_keys,
            shares.next().unwrap_or_default(),
            root_in_tb,
            shared,
            limits,
            options,
            tb,
        );
        pns::pn_search(&mut worker, options.pns_hash);

        while limits.infinite && !shared.stop() {
            std::thread::yield_now();
        }
        shared.request_stop();
        finished.push(worker);
    } else {
        println!("info string Starting Alpha-Beta Search ...");
        info!(mate = limits.mate, threads, "alpha-beta search starting");

        let mut main_worker = Worker::new(
            0,
            pos.clone(),
            game_keys,
            shares.next().unwrap_or_default(),
            root_in_tb,
            shared,
            limits,
            options,
            tb,
        );

        std::thread::scope(|s| {
            let mut handles = Vec::new();
            for (id, share) in shares.enumerate() {
                let mut worker = Worker::new(
                    id + 1,
                    pos.clone(),
                    game_keys,
                    share,
                    root_in_tb,
                    shared,
                    limits,
                    options,
                    tb,
                );
                handles.push(s.spawn(move || {
                    worker.search();
                    worker
                }));
            }

            main_worker.search();

            // Busy wait for a stop in infinite mode
            while limits.infinite && !shared.stop() {
                std::thread::yield_now();
            }

            // Stop the threads if not already stopped
            shared.request_stop();

            finished.push(main_worker);
            for handle in handles {
                finished.push(handle.join().expect("search worker panicked"));
            }
        });
    }

    // Pick the thread with the best score
    let best = finished
        .iter()
        .filter(|w| !w.root_moves.is_empty())
        .max_by(|a, b| a.root_moves[0].cmp_root(&b.root_moves[0]))
        .expect("at least the main worker has root moves");

    let best_rm = &best.root_moves[0];

    // Give some info about the final result of the search
    if best_rm.score < VALUE_MATE_IN_MAX_PLY {
        println!(
            "info string Failure! No mate in {} found!",
            limits.mate
        );
    } else {
        println!(
            "info string Success! Mate in {} found!",
            (VALUE_MATE - best_rm.score + 1) / 2
        );
    }
    debug!(
        score = best_rm.score,
        nodes = shared.nodes_searched(),
        "search finished"
    );

    // Print the best PV line
    println!(
        "{}",
        uci_pv_line(best.root_depth, best_rm, shared, limits, pos.castles().mode())
    );

    // Send best move and ponder move (if available)
    let mode = pos.castles().mode();
    if best_rm.pv.len() > 1 {
        println!(
            "bestmove {} ponder {}",
            best_rm.pv[0].to_uci(mode),
            best_rm.pv[1].to_uci(mode)
        );
    } else {
        println!("bestmove {}", best_rm.pv[0].to_uci(mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::fen::Fen;
    use shakmaty::CastlingMode;

    use crate::draw::key;

    fn pos(fen: &str) -> Chess {
        fen.parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap()
    }

    fn run(fen: &str, mate: u32, threads: usize) -> SearchShared {
        let p = pos(fen);
        let limits = Limits::mate(mate);
        let mut options = Options::default();
        options.threads = threads;
        let tb = TbAdapter::disabled();
        let shared = SearchShared::new(threads);
        let keys = vec![key(&p)];
        go(&p, &keys, &limits, &options, &tb, &shared);
        shared
    }

    #[test]
    fn single_threaded_mate_completes() {
        let shared = run(
            "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            1,
            1,
        );
        assert!(shared.stop());
        assert!(shared.nodes_searched() >= 1);
    }

    #[test]
    fn multi_threaded_mate_completes() {
        let shared = run("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1", 2, 4);
        assert!(shared.stop());
    }

    #[test]
    fn mated_root_reports_depth_zero() {
        // Fool's mate position: white is checkmated, no moves to search
        let shared = run(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            1,
            1,
        );
        // Nothing was searched
        assert_eq!(shared.nodes_searched(), 0);
    }

    #[test]
    fn stalemate_root_reports_depth_zero() {
        let shared = run("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1", 1, 1);
        assert_eq!(shared.nodes_searched(), 0);
    }
}
