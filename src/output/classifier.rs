use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

/// ANSI CSI and OSC sequences, bare two-byte escapes, and legacy `§` color codes.
static CONTROL_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-_]|§[0-9a-fk-orA-FK-OR]")
        .expect("invalid control sequence pattern")
});

/// `...]: <Name> message`, optionally tagged `[Not Secure]` by newer servers.
static CHAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]: (?:\[Not Secure\] )?<(?P<name>[^<>\s]+)>(?:\s|$)")
        .expect("invalid chat pattern")
});

static JOIN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<name>[^\s<>\[\]:]+) joined the game$")
        .expect("invalid join pattern")
});

static LEAVE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<name>[^\s<>\[\]:]+) left the game$")
        .expect("invalid leave pattern")
});

/// Operational stream a server output line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputCategory {
    /// A player wrote in chat.
    ChatMessage,
    /// A player joined the server.
    PlayerJoin,
    /// A player left the server.
    PlayerLeave,
    /// Everything else.
    SystemLog,
}

impl fmt::Display for OutputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OutputCategory::ChatMessage => "chat",
            OutputCategory::PlayerJoin => "join",
            OutputCategory::PlayerLeave => "leave",
            OutputCategory::SystemLog => "log",
        };
        f.write_str(label)
    }
}

/// Category of a line plus the player name extracted from it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Category of the line.
    pub category: OutputCategory,
    /// Player the line is about. Always `None` for `SystemLog`.
    pub player: Option<String>,
}

impl Classification {
    fn log() -> Self {
        Self {
            category: OutputCategory::SystemLog,
            player: None,
        }
    }

    fn with_player(category: OutputCategory, name: &str) -> Self {
        Self {
            category,
            player: Some(name.to_string()),
        }
    }
}

/// A cleaned output line with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEvent {
    /// Line text with control sequences removed.
    pub line: String,
    /// Category of the line.
    pub category: OutputCategory,
    /// Player the line is about.
    pub player: Option<String>,
}

impl OutputEvent {
    /// Cleans a raw line read from the server and classifies it.
    pub fn from_raw(raw: &str) -> Self {
        let line = strip_control_sequences(raw);
        let Classification { category, player } = classify(&line);
        Self {
            line,
            category,
            player,
        }
    }

    /// Wraps a line that did not come from the server (status messages, backup results).
    pub fn system(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            category: OutputCategory::SystemLog,
            player: None,
        }
    }
}

/// Removes terminal control sequences and surrounding whitespace.
pub fn strip_control_sequences(raw: &str) -> String {
    let cleaned = CONTROL_SEQUENCE.replace_all(raw, "");
    cleaned.trim().to_string()
}

/// Classifies a cleaned output line.
///
/// Checks run in a fixed order (chat, join, leave) so a chat message whose text
/// happens to read "X joined the game" stays a chat message. Stateless: the same
/// line always yields the same result.
///
/// ```
/// use mc_runner::output::{classify, OutputCategory};
///
/// let chat = classify("[12:00:01] [Server thread/INFO]: <Steve> hello there");
/// assert_eq!(chat.category, OutputCategory::ChatMessage);
/// assert_eq!(chat.player.as_deref(), Some("Steve"));
///
/// let join = classify("[12:00:02] [Server thread/INFO]: Alex joined the game");
/// assert_eq!(join.category, OutputCategory::PlayerJoin);
/// ```
pub fn classify(line: &str) -> Classification {
    let line = line.trim_end();

    if let Some(caps) = CHAT_LINE.captures(line) {
        return Classification::with_player(OutputCategory::ChatMessage, &caps["name"]);
    }
    if let Some(caps) = JOIN_LINE.captures(line) {
        return Classification::with_player(OutputCategory::PlayerJoin, &caps["name"]);
    }
    if let Some(caps) = LEAVE_LINE.captures(line) {
        return Classification::with_player(OutputCategory::PlayerLeave, &caps["name"]);
    }

    Classification::log()
}
