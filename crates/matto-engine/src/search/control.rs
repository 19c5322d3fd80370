//! Shared search state: stop flag, node accounting, time checks.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::limits::Limits;
use crate::score::MAX_PLY;

/// State shared by all workers of one search.
///
/// Per-worker counters are separate atomics to avoid contention; aggregates
/// are relaxed sums and therefore approximate, which is fine for `info nps`
/// and limit checks.
pub struct SearchShared {
    stop: AtomicBool,
    nodes: Vec<AtomicU64>,
    tb_hits: Vec<AtomicU64>,
    movecount: Vec<AtomicU32>,
}

impl SearchShared {
    /// Fresh shared state for `threads` workers.
    pub fn new(threads: usize) -> Self {
        Self {
            stop: AtomicBool::new(false),
            nodes: (0..threads).map(|_| AtomicU64::new(0)).collect(),
            tb_hits: (0..threads).map(|_| AtomicU64::new(0)).collect(),
            movecount: (0..MAX_PLY as usize).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Whether the search has been told to stop.
    pub fn stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Tell every worker to return at its next poll.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Node counter of worker `id`.
    pub fn nodes(&self, id: usize) -> &AtomicU64 {
        &self.nodes[id]
    }

    /// Tablebase-hit counter of worker `id`.
    pub fn tb_hits(&self, id: usize) -> &AtomicU64 {
        &self.tb_hits[id]
    }

    /// Total nodes searched, summed over all workers.
    pub fn nodes_searched(&self) -> u64 {
        self.nodes.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Total tablebase hits, summed over all workers.
    pub fn total_tb_hits(&self) -> u64 {
        self.tb_hits.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Count a root move searched at `depth` and return the new total.
    pub fn bump_movecount(&self, depth: i32) -> u32 {
        self.movecount[depth as usize].fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Periodic time/node-limit poll, owned by the main worker.
///
/// Called once per node; it only inspects the clock every `calls_cnt`
/// decrements to keep the poll off the hot path.
pub struct TimeCheck {
    calls_cnt: i32,
}

impl TimeCheck {
    pub fn new() -> Self {
        Self { calls_cnt: 0 }
    }

    /// Poll the limits, setting the shared stop flag when exceeded.
    pub fn check(&mut self, limits: &Limits, shared: &SearchShared) {
        self.calls_cnt -= 1;
        if self.calls_cnt > 0 {
            return;
        }

        // When using nodes, ensure the checking rate is not lower than
        // 0.1% of the budget
        self.calls_cnt = match limits.nodes {
            Some(n) => ((n / 1024) as i32).clamp(8, 512),
            None => 512,
        };

        if let Some(movetime) = limits.movetime {
            if limits.elapsed() >= movetime {
                shared.request_stop();
            }
        }

        if let Some(nodes) = limits.nodes {
            if shared.nodes_searched() >= nodes {
                shared.request_stop();
            }
        }
    }
}

impl Default for TimeCheck {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn stop_flag_round_trip() {
        let shared = SearchShared::new(2);
        assert!(!shared.stop());
        shared.request_stop();
        assert!(shared.stop());
    }

    #[test]
    fn node_counts_aggregate_across_workers() {
        let shared = SearchShared::new(3);
        shared.nodes(0).fetch_add(5, Ordering::Relaxed);
        shared.nodes(2).fetch_add(7, Ordering::Relaxed);
        assert_eq!(shared.nodes_searched(), 12);
    }

    #[test]
    fn movecount_increments_per_depth() {
        let shared = SearchShared::new(1);
        assert_eq!(shared.bump_movecount(3), 1);
        assert_eq!(shared.bump_movecount(3), 2);
        assert_eq!(shared.bump_movecount(5), 1);
    }

    #[test]
    fn node_limit_sets_stop() {
        let shared = SearchShared::new(1);
        let mut limits = Limits::mate(2);
        limits.nodes = Some(10);
        shared.nodes(0).fetch_add(20, Ordering::Relaxed);

        let mut tc = TimeCheck::new();
        tc.check(&limits, &shared);
        assert!(shared.stop());
    }

    #[test]
    fn movetime_zero_sets_stop() {
        let shared = SearchShared::new(1);
        let mut limits = Limits::mate(2);
        limits.movetime = Some(Duration::ZERO);

        let mut tc = TimeCheck::new();
        tc.check(&limits, &shared);
        assert!(shared.stop());
    }
}
