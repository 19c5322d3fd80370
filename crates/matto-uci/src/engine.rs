//! Event-driven UCI engine loop.
//!
//! A reader thread feeds parsed commands into a channel; searches run on
//! their own thread so `stop` and `quit` stay responsive while thinking.

use std::io::{self, BufRead};
use std::sync::mpsc;
use std::sync::Arc;

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Position, Rank, Square};
use tracing::{debug, info, warn};

use matto_engine::draw::key;
use matto_engine::search::control::SearchShared;
use matto_engine::search::pool;
use matto_engine::{Limits, Options, TbAdapter};

use crate::command::{parse_command, Command, GoParams, PositionSpec};
use crate::error::UciError;

/// Built-in bench suite: mate problems small enough to run back to back.
const BENCH_POSITIONS: &[(&str, u32)] = &[
    ("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4", 1),
    ("4k3/8/7p/1R6/8/8/8/R5K1 w - - 0 1", 2),
    ("8/8/8/8/2Np4/3N4/k1K5/8 w - - 0 1", 4),
];

/// Internal engine state.
enum EngineState {
    Idle,
    Searching,
}

/// Events processed by the main engine loop.
enum EngineEvent {
    UciCommand(Result<Command, UciError>),
    SearchDone,
    InputClosed,
}

/// The UCI engine, holding the current position, options and tablebases.
pub struct UciEngine {
    pos: Chess,
    /// Zobrist keys of the game history, ending at `pos`.
    keys: Vec<u64>,
    options: Options,
    tb: Arc<TbAdapter>,
    state: EngineState,
    shared: Option<Arc<SearchShared>>,
}

impl UciEngine {
    /// Create a new engine with the starting position.
    pub fn new() -> Self {
        let pos = Chess::default();
        let keys = vec![key(&pos)];
        let options = Options::default();
        let tb = Arc::new(TbAdapter::new(&options));
        Self {
            pos,
            keys,
            options,
            tb,
            state: EngineState::Idle,
            shared: None,
        }
    }

    /// Run the UCI event loop, reading from stdin until `quit` or EOF.
    pub fn run(mut self) -> Result<(), UciError> {
        let (tx, rx) = mpsc::channel::<EngineEvent>();

        // Spawn stdin reader thread
        let stdin_tx = tx.clone();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        debug!(cmd = %trimmed, "received UCI command");
                        let cmd = parse_command(trimmed);
                        if stdin_tx.send(EngineEvent::UciCommand(cmd)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            let _ = stdin_tx.send(EngineEvent::InputClosed);
        });

        for event in &rx {
            match event {
                EngineEvent::UciCommand(Ok(cmd)) => match cmd {
                    Command::Uci => self.handle_uci(),
                    Command::IsReady => println!("readyok"),
                    Command::UciNewGame => {
                        self.wait_for_search(&rx);
                        self.reload_tb();
                    }
                    Command::SetOption { name, value } => self.handle_setoption(&name, &value),
                    Command::Position(spec) => self.handle_position(&spec),
                    Command::Go(params) => self.handle_go(params, &tx),
                    Command::Stop => self.handle_stop(),
                    Command::Quit => {
                        self.handle_stop();
                        self.wait_for_search(&rx);
                        break;
                    }
                    Command::ShowBoard => self.show_board(),
                    Command::Flip => self.handle_flip(),
                    Command::Eval => println!("No eval available!"),
                    Command::Compiler => println!(
                        "Matto {} ({}-{})",
                        env!("CARGO_PKG_VERSION"),
                        std::env::consts::OS,
                        std::env::consts::ARCH
                    ),
                    Command::Bench => self.handle_bench(),
                    Command::Unknown(line) => {
                        if !line.is_empty() && !line.starts_with('#') {
                            println!("info string Unknown command: {}", line);
                        }
                    }
                },
                EngineEvent::UciCommand(Err(e)) => {
                    warn!(error = %e, "UCI parse error");
                    println!("info string {}", e);
                }
                EngineEvent::SearchDone => {
                    self.state = EngineState::Idle;
                    self.shared = None;
                }
                EngineEvent::InputClosed => break,
            }
        }

        info!("matto shutting down");
        Ok(())
    }

    fn handle_uci(&self) {
        println!("id name Matto {}", env!("CARGO_PKG_VERSION"));
        println!("id author Nicolas Lazaro");
        println!("{}", self.options.uci_declarations());
        println!("uciok");
    }

    fn handle_setoption(&mut self, name: &str, value: &str) {
        if matches!(self.state, EngineState::Searching) {
            warn!("setoption received while searching, ignoring");
            return;
        }

        match self.options.set(name, value) {
            Ok(()) => {
                let lowered = name.to_ascii_lowercase();
                if lowered.starts_with("syzygy") {
                    self.reload_tb();
                }
            }
            Err(e) => println!("info string {}", e),
        }
    }

    fn reload_tb(&mut self) {
        self.tb = Arc::new(TbAdapter::new(&self.options));
    }

    fn handle_position(&mut self, spec: &PositionSpec) {
        match self.resolve_position(spec) {
            Ok((pos, keys)) => {
                self.pos = pos;
                self.keys = keys;
            }
            Err(e) => {
                warn!(error = %e, "position command rejected");
                println!("info string {}", e);
            }
        }
    }

    fn resolve_position(&self, spec: &PositionSpec) -> Result<(Chess, Vec<u64>), UciError> {
        let mode = self.castling_mode();

        let mut pos: Chess = match &spec.fen {
            None => Chess::default(),
            Some(fen) => fen
                .parse::<Fen>()
                .map_err(|_| UciError::InvalidFen { fen: fen.clone() })?
                .into_position(mode)
                .map_err(|_| UciError::InvalidFen { fen: fen.clone() })?,
        };

        let mut keys = vec![key(&pos)];
        for uci_str in &spec.moves {
            let m = uci_str
                .parse::<UciMove>()
                .ok()
                .and_then(|u| u.to_move(&pos).ok())
                .ok_or_else(|| UciError::InvalidMove {
                    uci_move: uci_str.clone(),
                })?;
            pos.play_unchecked(&m);
            keys.push(key(&pos));
        }

        Ok((pos, keys))
    }

    fn castling_mode(&self) -> CastlingMode {
        if self.options.chess960 {
            CastlingMode::Chess960
        } else {
            CastlingMode::Standard
        }
    }

    fn handle_go(&mut self, params: GoParams, tx: &mpsc::Sender<EngineEvent>) {
        if matches!(self.state, EngineState::Searching) {
            warn!("go received while not idle, ignoring");
            return;
        }

        let limits = self.build_limits(&params);
        let threads = self.options.threads.max(1);
        let shared = Arc::new(SearchShared::new(threads));

        let pos = self.pos.clone();
        let keys = self.keys.clone();
        let options = self.options.clone();
        let tb = Arc::clone(&self.tb);
        let search_shared = Arc::clone(&shared);
        let tx = tx.clone();

        std::thread::spawn(move || {
            pool::go(&pos, &keys, &limits, &options, &tb, &search_shared);
            let _ = tx.send(EngineEvent::SearchDone);
        });

        self.state = EngineState::Searching;
        self.shared = Some(shared);
    }

    /// Turn `go` parameters into [`Limits`], coercing a missing mate
    /// distance to 1: the engine declines open-ended play.
    fn build_limits(&self, params: &GoParams) -> Limits {
        let mate = match params.mate.or(params.depth) {
            Some(n) if n > 0 => n,
            _ => {
                println!(
                    "info string Infinite analysis or game playing mode not supported!"
                );
                println!("Please set a depth or mate limit.");
                1
            }
        };

        let searchmoves = params
            .searchmoves
            .iter()
            .filter_map(|s| s.parse::<UciMove>().ok())
            .filter_map(|u| u.to_move(&self.pos).ok())
            .collect();

        let mut limits = Limits::mate(mate);
        limits.searchmoves = searchmoves;
        limits.nodes = params.nodes;
        limits.movetime = params.movetime;
        limits.perft = params.perft;
        limits.infinite = params.infinite;
        limits
    }

    fn handle_stop(&mut self) {
        if let Some(shared) = &self.shared {
            shared.request_stop();
        }
    }

    /// Block until a running search signals completion, keeping the
    /// synchronization commands responsive.
    fn wait_for_search(&mut self, rx: &mpsc::Receiver<EngineEvent>) {
        if !matches!(self.state, EngineState::Searching) {
            return;
        }
        self.handle_stop();
        for event in rx {
            match event {
                EngineEvent::SearchDone => {
                    self.state = EngineState::Idle;
                    self.shared = None;
                    break;
                }
                EngineEvent::UciCommand(Ok(Command::IsReady)) => println!("readyok"),
                EngineEvent::UciCommand(Ok(Command::Stop)) => self.handle_stop(),
                EngineEvent::InputClosed => break,
                _ => {}
            }
        }
    }

    fn show_board(&self) {
        let board = self.pos.board();
        println!(" +---+---+---+---+---+---+---+---+");
        for rank in (0..8).rev() {
            let mut line = String::from(" |");
            for file in 0..8 {
                let sq = Square::from_coords(File::new(file), Rank::new(rank));
                let c = board.piece_at(sq).map_or(' ', |p| p.char());
                line.push_str(&format!(" {} |", c));
            }
            println!("{}", line);
            println!(" +---+---+---+---+---+---+---+---+");
        }
        println!(
            "\nFen: {}",
            Fen::from_position(self.pos.clone(), EnPassantMode::Legal)
        );
        println!("Key: {:016X}", key(&self.pos));
    }

    fn handle_flip(&mut self) {
        let fen = Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string();
        let flipped = flip_fen(&fen);
        match flipped
            .parse::<Fen>()
            .ok()
            .and_then(|f| f.into_position(self.castling_mode()).ok())
        {
            Some(pos) => {
                self.keys = vec![key(&pos)];
                self.pos = pos;
            }
            None => warn!(fen = %flipped, "flip produced an invalid position"),
        }
    }

    fn handle_bench(&mut self) {
        let start = std::time::Instant::now();
        let mut nodes = 0u64;

        for (i, (fen, mate)) in BENCH_POSITIONS.iter().enumerate() {
            eprintln!("\nPosition: {}/{}", i + 1, BENCH_POSITIONS.len());

            let spec = PositionSpec {
                fen: Some(fen.to_string()),
                moves: Vec::new(),
            };
            let (pos, keys) = match self.resolve_position(&spec) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(error = %e, "bench position rejected");
                    continue;
                }
            };

            let limits = Limits::mate(*mate);
            let threads = self.options.threads.max(1);
            let shared = SearchShared::new(threads);
            pool::go(&pos, &keys, &limits, &self.options, &self.tb, &shared);
            nodes += shared.nodes_searched();
        }

        let elapsed = start.elapsed().as_millis().max(1);
        eprintln!("\n===========================");
        eprintln!("Total time (ms) : {}", elapsed);
        eprintln!("Nodes searched  : {}", nodes);
        eprintln!("Nodes/second    : {}", nodes as u128 * 1000 / elapsed);
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror a FEN vertically and swap the colours, as the `flip` debug
/// command expects.
fn flip_fen(fen: &str) -> String {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() < 4 {
        return fen.to_string();
    }

    let board: String = fields[0]
        .split('/')
        .rev()
        .collect::<Vec<_>>()
        .join("/")
        .chars()
        .map(swap_case)
        .collect();

    let side = if fields[1] == "w" { "b" } else { "w" };

    let castling = if fields[2] == "-" {
        "-".to_string()
    } else {
        let swapped: Vec<char> = fields[2].chars().map(swap_case).collect();
        let upper: String = swapped.iter().filter(|c| c.is_ascii_uppercase()).collect();
        let lower: String = swapped.iter().filter(|c| c.is_ascii_lowercase()).collect();
        format!("{}{}", upper, lower)
    };

    let ep = if fields[3] == "-" {
        "-".to_string()
    } else {
        fields[3]
            .chars()
            .map(|c| match c {
                '3' => '6',
                '6' => '3',
                other => other,
            })
            .collect()
    };

    let mut out = format!("{} {} {} {}", board, side, castling, ep);
    for field in &fields[4..] {
        out.push(' ');
        out.push_str(field);
    }
    out
}

fn swap_case(c: char) -> char {
    if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_fen_startpos_is_symmetric() {
        let fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
        let flipped = flip_fen(fen);
        assert_eq!(flipped, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1");
    }

    #[test]
    fn flip_fen_swaps_piece_colours() {
        let fen = "4k3/8/8/8/8/8/8/R3K3 w - - 0 1";
        assert_eq!(flip_fen(fen), "r3k3/8/8/8/8/8/8/4K3 b - - 0 1");
    }

    #[test]
    fn flip_fen_moves_en_passant_rank() {
        let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
        let flipped = flip_fen(fen);
        assert!(flipped.contains(" e6 "));
    }

    #[test]
    fn flip_is_an_involution_on_the_board() {
        let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
        assert_eq!(flip_fen(&flip_fen(fen)), fen);
    }

    #[test]
    fn resolve_position_replays_moves() {
        let engine = UciEngine::new();
        let spec = PositionSpec {
            fen: None,
            moves: vec!["e2e4".into(), "e7e5".into()],
        };
        let (pos, keys) = engine.resolve_position(&spec).unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(pos.board().occupied().count(), 32);
    }

    #[test]
    fn resolve_position_rejects_illegal_move() {
        let engine = UciEngine::new();
        let spec = PositionSpec {
            fen: None,
            moves: vec!["e2e5".into()],
        };
        assert!(engine.resolve_position(&spec).is_err());
    }

    #[test]
    fn resolve_position_rejects_bad_fen() {
        let engine = UciEngine::new();
        let spec = PositionSpec {
            fen: Some("not a fen".into()),
            moves: Vec::new(),
        };
        assert!(engine.resolve_position(&spec).is_err());
    }

    #[test]
    fn build_limits_coerces_missing_mate_to_one() {
        let engine = UciEngine::new();
        let limits = engine.build_limits(&GoParams::default());
        assert_eq!(limits.mate, 1);
    }

    #[test]
    fn build_limits_depth_is_mate_alias() {
        let engine = UciEngine::new();
        let mut params = GoParams::default();
        params.depth = Some(11);
        let limits = engine.build_limits(&params);
        assert_eq!(limits.mate, 11);
    }

    #[test]
    fn build_limits_resolves_searchmoves() {
        let engine = UciEngine::new();
        let mut params = GoParams::default();
        params.mate = Some(2);
        params.searchmoves = vec!["e2e4".into(), "zz99".into()];
        let limits = engine.build_limits(&params);
        assert_eq!(limits.searchmoves.len(), 1);
    }
}
