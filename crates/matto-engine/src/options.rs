//! Engine options, mutated only between searches.

use std::fmt;

/// Typed store for the recognized UCI options.
///
/// `Hash` is accepted for GUI compatibility but the mate searchers keep no
/// transposition table, so it has no effect on the search itself.
#[derive(Debug, Clone)]
pub struct Options {
    pub threads: usize,
    pub hash: usize,
    /// Arena size for the proof-number search, in MiB.
    pub pns_hash: usize,
    /// Defender king mobility cap; 8 disables the cap.
    pub king_moves: i32,
    /// Defender total mobility cap; 250 disables the cap.
    pub all_moves: i32,
    pub proof_number_search: bool,
    pub root_move_stats: bool,
    pub syzygy_path: Option<String>,
    pub syzygy_probe_depth: i32,
    pub syzygy_probe_limit: u32,
    pub syzygy_50_move_rule: bool,
    pub chess960: bool,
}

/// Maximum accepted PNS arena size in MiB.
pub const PNS_HASH_MAX: usize = 32_768;

impl Default for Options {
    fn default() -> Self {
        Self {
            threads: 1,
            hash: 16,
            pns_hash: 256,
            king_moves: 8,
            all_moves: 250,
            proof_number_search: false,
            root_move_stats: false,
            syzygy_path: None,
            syzygy_probe_depth: 1,
            syzygy_probe_limit: 7,
            syzygy_50_move_rule: true,
            chess960: false,
        }
    }
}

/// Error raised by [`Options::set`] for an unrecognized option name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoSuchOption(pub String);

impl fmt::Display for NoSuchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No such option: {}", self.0)
    }
}

impl Options {
    /// Update the option `name` (case-insensitive) to `value`.
    ///
    /// Out-of-range numeric values are clamped to the option's bounds, the
    /// way a UCI GUI is allowed to expect. Unparsable values leave the
    /// option unchanged.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), NoSuchOption> {
        match name.to_ascii_lowercase().as_str() {
            "threads" => self.threads = int(value, 1).clamp(1, 512) as usize,
            "hash" => self.hash = int(value, 16).clamp(1, 1 << 20) as usize,
            "pns hash" => self.pns_hash = int(value, 256).clamp(1, PNS_HASH_MAX as i64) as usize,
            "kingmoves" => self.king_moves = int(value, 8).clamp(0, 8) as i32,
            "allmoves" => self.all_moves = int(value, 250).clamp(1, 250) as i32,
            "proofnumbersearch" => self.proof_number_search = boolean(value),
            "rootmovestats" => self.root_move_stats = boolean(value),
            "syzygypath" => {
                let trimmed = value.trim();
                self.syzygy_path = if trimmed.is_empty() || trimmed == "<empty>" {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
            "syzygyprobedepth" => self.syzygy_probe_depth = int(value, 1).clamp(1, 100) as i32,
            "syzygyprobelimit" => self.syzygy_probe_limit = int(value, 7).clamp(0, 7) as u32,
            "syzygy50moverule" => self.syzygy_50_move_rule = boolean(value),
            "uci_chess960" => self.chess960 = boolean(value),
            _ => return Err(NoSuchOption(name.to_string())),
        }
        Ok(())
    }

    /// The `option name … type …` block answered to the `uci` command.
    pub fn uci_declarations(&self) -> String {
        [
            "option name Threads type spin default 1 min 1 max 512",
            "option name Hash type spin default 16 min 1 max 1048576",
            "option name PNS Hash type spin default 256 min 1 max 32768",
            "option name KingMoves type spin default 8 min 0 max 8",
            "option name AllMoves type spin default 250 min 1 max 250",
            "option name ProofNumberSearch type check default false",
            "option name RootMoveStats type check default false",
            "option name SyzygyPath type string default <empty>",
            "option name SyzygyProbeDepth type spin default 1 min 1 max 100",
            "option name SyzygyProbeLimit type spin default 7 min 0 max 7",
            "option name Syzygy50MoveRule type check default true",
            "option name UCI_Chess960 type check default false",
        ]
        .join("\n")
    }
}

fn int(value: &str, fallback: i64) -> i64 {
    value.trim().parse().unwrap_or(fallback)
}

fn boolean(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_case_insensitive() {
        let mut opts = Options::default();
        opts.set("threads", "4").unwrap();
        assert_eq!(opts.threads, 4);
        opts.set("THREADS", "2").unwrap();
        assert_eq!(opts.threads, 2);
    }

    #[test]
    fn option_name_with_space() {
        let mut opts = Options::default();
        opts.set("PNS Hash", "512").unwrap();
        assert_eq!(opts.pns_hash, 512);
    }

    #[test]
    fn pns_hash_is_capped() {
        let mut opts = Options::default();
        opts.set("PNS Hash", "99999").unwrap();
        assert_eq!(opts.pns_hash, PNS_HASH_MAX);
    }

    #[test]
    fn king_moves_clamped_to_range() {
        let mut opts = Options::default();
        opts.set("KingMoves", "42").unwrap();
        assert_eq!(opts.king_moves, 8);
        opts.set("KingMoves", "-3").unwrap();
        assert_eq!(opts.king_moves, 0);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut opts = Options::default();
        let err = opts.set("Ponder", "true").unwrap_err();
        assert_eq!(err.to_string(), "No such option: Ponder");
    }

    #[test]
    fn booleans_parse_true_false() {
        let mut opts = Options::default();
        opts.set("ProofNumberSearch", "true").unwrap();
        assert!(opts.proof_number_search);
        opts.set("ProofNumberSearch", "false").unwrap();
        assert!(!opts.proof_number_search);
    }

    #[test]
    fn empty_syzygy_path_clears() {
        let mut opts = Options::default();
        opts.set("SyzygyPath", "/tb/syzygy").unwrap();
        assert_eq!(opts.syzygy_path.as_deref(), Some("/tb/syzygy"));
        opts.set("SyzygyPath", "<empty>").unwrap();
        assert!(opts.syzygy_path.is_none());
    }
}
