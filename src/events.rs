//! Console log line extraction.
//!
//! The hosting provider's web console emits free-text log lines. Only lines
//! carrying the `:LOG:DEFAULT:` framing hold game output; within those, a small
//! set of fixed shapes is recognized: chat messages, respawns, kill events and
//! position responses. Everything else is silently ignored.
//!
//! Parsing is pure: no side effects, no errors surfaced to callers. A line that
//! matches an outer shape but carries a malformed sub-pattern (e.g. coordinates
//! that are not valid numbers) logs a diagnostic and yields no event.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// Framing marker that separates console noise from the game log payload.
pub const LOG_MARKER: &str = ":LOG:DEFAULT:";

static CHAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[CHAT\s+([^\]]+)\]\s+([^:]+?)\s*:\s*(.+)").expect("chat pattern")
});

static RESPAWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([^\[\]]+?)\s*\[(ps4|xboxone)\] has entered the game$")
        .expect("respawn pattern")
});

static KILL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?) was killed by (.+?)$").expect("kill pattern"));

static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((-?[\d.]+)[,\s]+(-?[\d.]+)[,\s]+(-?[\d.]+)\)").expect("position pattern")
});

/// Chat channel a message was sent on, plus the `All` wildcard used by rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatType {
    Local,
    Team,
    Server,
    #[default]
    All,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Local => "LOCAL",
            ChatType::Team => "TEAM",
            ChatType::Server => "SERVER",
            ChatType::All => "ALL",
        }
    }

    /// Whether a rule with this filter applies to a message seen on the given
    /// channel. `All` matches everything; otherwise the comparison is
    /// case-insensitive against the raw channel text from the log line.
    pub fn matches(&self, observed: &str) -> bool {
        match self {
            ChatType::All => true,
            other => other.as_str().eq_ignore_ascii_case(observed.trim()),
        }
    }
}

impl fmt::Display for ChatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chat message observed on the console.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// Raw channel text as it appeared in the line (e.g. "LOCAL")
    pub chat_type: String,
    /// Player name exactly as logged, not yet normalized
    pub player: String,
    pub message: String,
}

/// A player respawn ("has entered the game") line.
#[derive(Debug, Clone, PartialEq)]
pub struct RespawnEvent {
    pub player: String,
    pub platform: String,
}

/// A kill-feed line.
#[derive(Debug, Clone, PartialEq)]
pub struct KillEvent {
    pub killer: String,
    pub victim: String,
}

/// A position response: a parenthesized triple of signed decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// One typed event extracted from a console log payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Chat(ChatEvent),
    Respawn(RespawnEvent),
    Kill(KillEvent),
    Position(Position),
}

/// Strip the `:LOG:DEFAULT:` framing from a raw scraped line.
///
/// Returns `None` for lines without the marker; those carry no game output.
pub fn extract_payload(raw: &str) -> Option<&str> {
    raw.split_once(LOG_MARKER).map(|(_, rest)| rest.trim())
}

/// Parse a framed payload into a typed event.
///
/// Unrecognized lines return `None`; that is the common case and not an error.
pub fn parse_event(payload: &str) -> Option<ConsoleEvent> {
    if let Some(caps) = RESPAWN_RE.captures(payload) {
        return Some(ConsoleEvent::Respawn(RespawnEvent {
            player: caps[1].trim().to_string(),
            platform: caps[2].to_lowercase(),
        }));
    }

    if let Some(caps) = CHAT_RE.captures(payload) {
        return Some(ConsoleEvent::Chat(ChatEvent {
            chat_type: caps[1].trim().to_string(),
            player: caps[2].trim().to_string(),
            message: caps[3].trim().to_string(),
        }));
    }

    if let Some(caps) = KILL_RE.captures(payload) {
        return Some(ConsoleEvent::Kill(KillEvent {
            victim: caps[1].trim().to_string(),
            killer: caps[2].trim().to_string(),
        }));
    }

    if let Some(caps) = POSITION_RE.captures(payload) {
        return parse_position_captures(payload, &caps[1], &caps[2], &caps[3])
            .map(ConsoleEvent::Position);
    }

    None
}

fn parse_position_captures(payload: &str, x: &str, y: &str, z: &str) -> Option<Position> {
    match (x.parse::<f64>(), y.parse::<f64>(), z.parse::<f64>()) {
        (Ok(x), Ok(y), Ok(z)) => Some(Position { x, y, z }),
        _ => {
            warn!(line = payload, "failed to parse position coordinates");
            None
        }
    }
}
