//! UCI command parsing.
//!
//! Parsing is position- and option-free: `position` and `go searchmoves`
//! keep their move lists as raw strings, resolved by the engine against the
//! current position and castling convention.

use std::time::Duration;

use crate::error::UciError;

/// Parameters for the `go` command.
///
/// All fields are optional; `depth` is an alias for `mate` in this engine
/// and a bare `go` is later coerced to `mate 1`.
#[derive(Debug, Clone, Default)]
pub struct GoParams {
    /// Restrict the search to these root moves (coordinate notation).
    pub searchmoves: Vec<String>,
    /// Target mate distance in full moves.
    pub mate: Option<u32>,
    /// Alias for `mate`, kept separate for the coercion warning.
    pub depth: Option<u32>,
    /// Node budget.
    pub nodes: Option<u64>,
    /// Wall-clock budget.
    pub movetime: Option<Duration>,
    /// Run perft instead of searching.
    pub perft: Option<u32>,
    /// Search until `stop`.
    pub infinite: bool,
}

/// An unresolved `position` command.
#[derive(Debug, Clone)]
pub struct PositionSpec {
    /// FEN to set up, or `None` for the starting position.
    pub fen: Option<String>,
    /// Moves to replay from there (coordinate notation).
    pub moves: Vec<String>,
}

/// A parsed UCI command.
#[derive(Debug)]
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- clear search state, reload tablebases.
    UciNewGame,
    /// `setoption name NAME [value VALUE]`.
    SetOption { name: String, value: String },
    /// `position` -- set up a position with optional moves applied.
    Position(PositionSpec),
    /// `go` -- start searching with the given parameters.
    Go(GoParams),
    /// `stop` -- halt the current search.
    Stop,
    /// `quit` -- exit the engine.
    Quit,
    /// `d` -- print the current position.
    ShowBoard,
    /// `flip` -- flip the position's colours.
    Flip,
    /// `eval` -- this engine has no evaluation.
    Eval,
    /// `compiler` -- print build information.
    Compiler,
    /// `bench` -- run the built-in mate suite.
    Bench,
    /// Unrecognized command, reported back to the user.
    Unknown(String),
}

/// Parse a single line of UCI input into a [`Command`].
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "setoption" => parse_setoption(&tokens[1..]),
        "stop" => Ok(Command::Stop),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "d" => Ok(Command::ShowBoard),
        "flip" => Ok(Command::Flip),
        "eval" => Ok(Command::Eval),
        "compiler" => Ok(Command::Compiler),
        "bench" => Ok(Command::Bench),
        _ => Ok(Command::Unknown(line.trim().to_string())),
    }
}

/// Parse `setoption name NAME [value VALUE]`; both name and value may
/// contain spaces.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    let mut name = Vec::new();
    let mut value = Vec::new();
    let mut i = 0;

    if tokens.first() == Some(&"name") {
        i = 1;
    }
    while i < tokens.len() && tokens[i] != "value" {
        name.push(tokens[i]);
        i += 1;
    }
    if i < tokens.len() && tokens[i] == "value" {
        i += 1;
        while i < tokens.len() {
            value.push(tokens[i]);
            i += 1;
        }
    }

    Ok(Command::SetOption {
        name: name.join(" "),
        value: value.join(" "),
    })
}

/// Parse the `position` command arguments.
///
/// Supports:
/// - `position startpos [moves e2e4 d7d5 ...]`
/// - `position fen <fen-string> [moves e2e4 d7d5 ...]`
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (fen, rest) = if tokens[0] == "startpos" {
        (None, &tokens[1..])
    } else if tokens[0] == "fen" {
        let end = tokens
            .iter()
            .position(|&t| t == "moves")
            .unwrap_or(tokens.len());
        if end < 2 {
            return Err(UciError::InvalidFen {
                fen: String::new(),
            });
        }
        (Some(tokens[1..end].join(" ")), &tokens[end..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    let moves = if rest.first() == Some(&"moves") {
        rest[1..].iter().map(|t| t.to_string()).collect()
    } else {
        Vec::new()
    };

    Ok(Command::Position(PositionSpec { fen, moves }))
}

/// Parse the `go` command arguments.
///
/// Supports: searchmoves, depth, mate, nodes, movetime, perft, infinite.
/// Unknown tokens are silently skipped.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "searchmoves" => {
                // Consume move-shaped tokens until the next keyword
                i += 1;
                while i < tokens.len() && looks_like_move(tokens[i]) {
                    params.searchmoves.push(tokens[i].to_string());
                    i += 1;
                }
            }
            "depth" => {
                params.depth = Some(parse_int(tokens.get(i + 1), "depth")?);
                i += 2;
            }
            "mate" => {
                params.mate = Some(parse_int(tokens.get(i + 1), "mate")?);
                i += 2;
            }
            "nodes" => {
                params.nodes = Some(parse_int(tokens.get(i + 1), "nodes")?);
                i += 2;
            }
            "movetime" => {
                let ms: u64 = parse_int(tokens.get(i + 1), "movetime")?;
                params.movetime = Some(Duration::from_millis(ms));
                i += 2;
            }
            "perft" => {
                params.perft = Some(parse_int(tokens.get(i + 1), "perft")?);
                i += 2;
            }
            "infinite" => {
                params.infinite = true;
                i += 1;
            }
            _ => {
                // Unknown token -- skip per UCI convention
                i += 1;
            }
        }
    }

    Ok(Command::Go(params))
}

/// Loose shape test for a coordinate-notation move (`e2e4`, `a7a8q`).
fn looks_like_move(token: &str) -> bool {
    let bytes = token.as_bytes();
    (bytes.len() == 4 || bytes.len() == 5)
        && bytes[0].is_ascii_lowercase()
        && bytes[1].is_ascii_digit()
        && bytes[2].is_ascii_lowercase()
        && bytes[3].is_ascii_digit()
}

/// Parse an integer value from a token.
fn parse_int<T: std::str::FromStr>(token: Option<&&str>, param: &str) -> Result<T, UciError> {
    let value = token.ok_or_else(|| UciError::InvalidGoValue {
        param: param.to_string(),
        value: String::new(),
    })?;
    value.parse().map_err(|_| UciError::InvalidGoValue {
        param: param.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uci() {
        assert!(matches!(parse_command("uci").unwrap(), Command::Uci));
    }

    #[test]
    fn parse_isready() {
        assert!(matches!(parse_command("isready").unwrap(), Command::IsReady));
    }

    #[test]
    fn parse_quit_and_stop() {
        assert!(matches!(parse_command("quit").unwrap(), Command::Quit));
        assert!(matches!(parse_command("stop").unwrap(), Command::Stop));
    }

    #[test]
    fn parse_setoption_simple() {
        let cmd = parse_command("setoption name Threads value 4").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "Threads");
                assert_eq!(value, "4");
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_name_with_spaces() {
        let cmd = parse_command("setoption name PNS Hash value 1024").unwrap();
        match cmd {
            Command::SetOption { name, value } => {
                assert_eq!(name, "PNS Hash");
                assert_eq!(value, "1024");
            }
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_setoption_value_with_spaces() {
        let cmd = parse_command("setoption name SyzygyPath value /tb/wdl /tb/dtz").unwrap();
        match cmd {
            Command::SetOption { value, .. } => assert_eq!(value, "/tb/wdl /tb/dtz"),
            _ => panic!("expected SetOption"),
        }
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = parse_command("position startpos moves e2e4 e7e5").unwrap();
        match cmd {
            Command::Position(spec) => {
                assert!(spec.fen.is_none());
                assert_eq!(spec.moves, vec!["e2e4", "e7e5"]);
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_fen() {
        let cmd = parse_command(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
        )
        .unwrap();
        match cmd {
            Command::Position(spec) => {
                assert!(spec.fen.unwrap().starts_with("rnbqkbnr/"));
                assert!(spec.moves.is_empty());
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_fen_with_moves() {
        let cmd =
            parse_command("position fen 4k3/8/8/8/8/8/8/R3K3 w - - 0 1 moves a1a8").unwrap();
        match cmd {
            Command::Position(spec) => {
                assert_eq!(spec.fen.unwrap(), "4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
                assert_eq!(spec.moves, vec!["a1a8"]);
            }
            _ => panic!("expected Position"),
        }
    }

    #[test]
    fn parse_position_missing_keyword() {
        assert!(parse_command("position").is_err());
        assert!(parse_command("position foo").is_err());
    }

    #[test]
    fn parse_go_mate() {
        let cmd = parse_command("go mate 5").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.mate, Some(5)),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_depth_alias() {
        let cmd = parse_command("go depth 11").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.depth, Some(11));
                assert!(params.mate.is_none());
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_bare_defaults() {
        let cmd = parse_command("go").unwrap();
        match cmd {
            Command::Go(params) => {
                assert!(params.mate.is_none());
                assert!(params.depth.is_none());
                assert!(!params.infinite);
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_searchmoves_then_keyword() {
        let cmd = parse_command("go searchmoves e2e4 d2d4 mate 3").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.searchmoves, vec!["e2e4", "d2d4"]);
                assert_eq!(params.mate, Some(3));
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_promotion_searchmove() {
        let cmd = parse_command("go searchmoves f7f8q mate 10").unwrap();
        match cmd {
            Command::Go(params) => assert_eq!(params.searchmoves, vec!["f7f8q"]),
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_nodes_movetime_perft_infinite() {
        let cmd = parse_command("go nodes 5000 movetime 2000 perft 3 infinite").unwrap();
        match cmd {
            Command::Go(params) => {
                assert_eq!(params.nodes, Some(5000));
                assert_eq!(params.movetime, Some(Duration::from_millis(2000)));
                assert_eq!(params.perft, Some(3));
                assert!(params.infinite);
            }
            _ => panic!("expected Go"),
        }
    }

    #[test]
    fn parse_go_invalid_value() {
        assert!(parse_command("go mate abc").is_err());
        assert!(parse_command("go nodes").is_err());
    }

    #[test]
    fn parse_debug_commands() {
        assert!(matches!(parse_command("d").unwrap(), Command::ShowBoard));
        assert!(matches!(parse_command("flip").unwrap(), Command::Flip));
        assert!(matches!(parse_command("eval").unwrap(), Command::Eval));
        assert!(matches!(
            parse_command("compiler").unwrap(),
            Command::Compiler
        ));
        assert!(matches!(parse_command("bench").unwrap(), Command::Bench));
    }

    #[test]
    fn parse_unknown_command_keeps_line() {
        match parse_command("frobnicate the board").unwrap() {
            Command::Unknown(line) => assert_eq!(line, "frobnicate the board"),
            _ => panic!("expected Unknown"),
        }
    }
}
