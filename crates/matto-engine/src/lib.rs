//! Matto engine core: a dual mate searcher over a shared move ranker.
//!
//! The alpha-beta searcher proves or refutes a forced mate within a target
//! depth of `2·mate − 1` plies; the proof-number searcher maintains an
//! explicit AND/OR tree in a bounded arena as an alternative strategy for
//! deep mates. Both consult the Syzygy tablebase adapter and share the
//! mate-oriented move ranker.

pub mod attacks;
pub mod draw;
pub mod limits;
pub mod options;
pub mod perft;
pub mod ranker;
pub mod score;
pub mod search;
pub mod tb;

pub use limits::Limits;
pub use options::Options;
pub use score::{uci_value, Value, MAX_PLY, VALUE_DRAW, VALUE_INFINITE, VALUE_MATE};
pub use search::control::SearchShared;
pub use search::{pool, RootMove};
pub use tb::TbAdapter;
