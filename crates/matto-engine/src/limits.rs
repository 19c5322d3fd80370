//! Search limits passed in by the `go` command.

use std::time::{Duration, Instant};

use shakmaty::Move;

/// Limits for one search, as sent by the GUI.
///
/// The engine declines open-ended play: `mate` is always positive by the
/// time a search starts. The UCI layer coerces `go infinite` and a bare
/// `go` to `mate 1` after warning the user.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Restrict the root to these moves, if non-empty.
    pub searchmoves: Vec<Move>,
    /// Hard wall-clock limit.
    pub movetime: Option<Duration>,
    /// Node budget across all threads.
    pub nodes: Option<u64>,
    /// Target mate distance in full moves.
    pub mate: u32,
    /// Run perft to this depth instead of searching.
    pub perft: Option<u32>,
    /// Keep the search alive until `stop` even after a proof.
    pub infinite: bool,
    /// When the search started.
    pub start_time: Instant,
}

impl Limits {
    /// Limits for a plain `go mate <n>`.
    pub fn mate(n: u32) -> Self {
        Self {
            searchmoves: Vec::new(),
            movetime: None,
            nodes: None,
            mate: n,
            perft: None,
            infinite: false,
            start_time: Instant::now(),
        }
    }

    /// Time elapsed since the search started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Elapsed milliseconds, at least 1 to keep nps division safe.
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis().max(1)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::mate(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_request_mate_in_one() {
        let limits = Limits::default();
        assert_eq!(limits.mate, 1);
        assert!(!limits.infinite);
        assert!(limits.searchmoves.is_empty());
    }

    #[test]
    fn elapsed_ms_is_positive() {
        let limits = Limits::mate(3);
        assert!(limits.elapsed_ms() >= 1);
    }
}
