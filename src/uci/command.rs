//! UCI command parsing. Unknown or malformed lines parse to `None` and
//! are skipped by the loop, per protocol convention.

use crate::search::SearchLimits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    Go(GoParams),
    SetOption {
        name: String,
        value: Option<String>,
    },
    Stop,
    Quit,
    /// Extension: print the current board (common debugging verb).
    Display,
    Perft(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u32>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
}

impl GoParams {
    /// Merge into base limits taken from the current option set.
    #[must_use]
    pub fn into_limits(self, mut limits: SearchLimits) -> SearchLimits {
        limits.depth = self.depth;
        limits.nodes = self.nodes;
        limits.movetime = self.movetime;
        limits.time = [self.wtime, self.btime];
        limits.inc = [self.winc, self.binc];
        limits.movestogo = self.movestogo;
        limits.infinite = self.infinite;
        limits
    }
}

#[must_use]
pub fn parse_command(line: &str) -> Option<UciCommand> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (&first, rest) = tokens.split_first()?;

    match first {
        "uci" => Some(UciCommand::Uci),
        "isready" => Some(UciCommand::IsReady),
        "ucinewgame" => Some(UciCommand::NewGame),
        "stop" => Some(UciCommand::Stop),
        "quit" => Some(UciCommand::Quit),
        "d" | "display" => Some(UciCommand::Display),
        "position" => parse_position(rest),
        "go" => Some(UciCommand::Go(parse_go(rest))),
        "setoption" => parse_setoption(rest),
        "perft" => {
            let depth = rest.first().and_then(|s| s.parse().ok()).unwrap_or(5);
            Some(UciCommand::Perft(depth))
        }
        _ => None,
    }
}

fn parse_position(tokens: &[&str]) -> Option<UciCommand> {
    let mut iter = tokens.iter().peekable();
    let fen = match iter.next()? {
        &"startpos" => None,
        &"fen" => {
            // FEN is six blank-separated fields.
            let fields: Vec<&str> = iter.by_ref().take(6).copied().collect();
            if fields.is_empty() {
                return None;
            }
            Some(fields.join(" "))
        }
        _ => return None,
    };

    let mut moves = Vec::new();
    if iter.peek().map(|s| **s) == Some("moves") {
        iter.next();
        moves.extend(iter.map(|s| (*s).to_string()));
    }

    Some(UciCommand::Position { fen, moves })
}

fn parse_go(tokens: &[&str]) -> GoParams {
    fn value<T: std::str::FromStr>(tokens: &[&str], i: usize) -> Option<T> {
        tokens.get(i + 1).and_then(|s| s.parse().ok())
    }

    let mut params = GoParams::default();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i] {
            "wtime" => params.wtime = value(tokens, i),
            "btime" => params.btime = value(tokens, i),
            "winc" => params.winc = value(tokens, i).unwrap_or(0),
            "binc" => params.binc = value(tokens, i).unwrap_or(0),
            "movestogo" => params.movestogo = value(tokens, i),
            "depth" => params.depth = value(tokens, i),
            "nodes" => params.nodes = value(tokens, i),
            "movetime" => params.movetime = value(tokens, i),
            "infinite" => {
                params.infinite = true;
                i += 1;
                continue;
            }
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }
    params
}

fn parse_setoption(tokens: &[&str]) -> Option<UciCommand> {
    let mut name_parts = Vec::new();
    let mut value_parts = Vec::new();
    let mut target: Option<&mut Vec<&str>> = None;

    for &token in tokens {
        match token {
            "name" => target = Some(&mut name_parts),
            "value" => target = Some(&mut value_parts),
            other => {
                if let Some(parts) = target.as_deref_mut() {
                    parts.push(other);
                }
            }
        }
    }

    if name_parts.is_empty() {
        return None;
    }
    Some(UciCommand::SetOption {
        name: name_parts.join(" "),
        value: if value_parts.is_empty() {
            None
        } else {
            Some(value_parts.join(" "))
        },
    })
}
