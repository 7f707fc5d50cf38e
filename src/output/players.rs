use crate::output::{OutputCategory, OutputEvent};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Reply to `list`: "There are 2 of a max of 20 players online: a, b" or "There are 2/20 players online:".
static PLAYER_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"There are (?P<count>\d+)(?:/\d+| of a max(?: of)? \d+) players online:\s*(?P<names>.*)$",
    )
    .expect("invalid player list pattern")
});

/// Parsed reply to the `list` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerList {
    /// Number of players the server reports.
    pub count: usize,
    /// Names of the online players.
    pub names: Vec<String>,
}

/// Parses the server's reply to `list`, if `line` is one.
pub fn parse_player_list(line: &str) -> Option<PlayerList> {
    let caps = PLAYER_LIST.captures(line.trim_end())?;
    let count = caps["count"].parse().ok()?;
    let names = caps["names"]
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    Some(PlayerList { count, names })
}

/// Point-in-time view of the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterSnapshot {
    /// Derived player count.
    pub count: usize,
    /// Currently known player names.
    pub names: BTreeSet<String>,
}

/// Player count and names derived from the ordered output stream.
///
/// Joins increment, leaves decrement (never below zero), and a `list` reply
/// replaces both with the server's own view.
#[derive(Debug, Default)]
pub struct PlayerRoster {
    count: usize,
    names: BTreeSet<String>,
}

impl PlayerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Applies one output event. Returns whether the count or the names changed.
    pub fn apply(&mut self, event: &OutputEvent) -> bool {
        match event.category {
            OutputCategory::PlayerJoin => {
                self.count += 1;
                if let Some(name) = &event.player {
                    self.names.insert(name.clone());
                }
                true
            }
            OutputCategory::PlayerLeave => {
                let removed = event
                    .player
                    .as_ref()
                    .is_some_and(|name| self.names.remove(name));
                let before = self.count;
                self.count = self.count.saturating_sub(1);
                removed || self.count != before
            }
            OutputCategory::SystemLog => match parse_player_list(&event.line) {
                Some(list) => self.resync(list),
                None => false,
            },
            OutputCategory::ChatMessage => false,
        }
    }

    /// Replaces the roster with the server's reported list. Returns whether anything changed.
    pub fn resync(&mut self, list: PlayerList) -> bool {
        let names: BTreeSet<String> = list.names.into_iter().collect();
        let changed = self.count != list.count || self.names != names;
        self.count = list.count;
        self.names = names;
        changed
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.names.clear();
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            count: self.count,
            names: self.names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(name: &str) -> OutputEvent {
        OutputEvent::from_raw(&format!("{} joined the game", name))
    }

    fn leave(name: &str) -> OutputEvent {
        OutputEvent::from_raw(&format!("{} left the game", name))
    }

    #[test]
    fn test_count_follows_joins_and_leaves() {
        let mut roster = PlayerRoster::new();

        assert!(roster.apply(&join("Alex")));
        assert!(roster.apply(&join("Steve")));
        assert!(roster.apply(&leave("Alex")));
        assert!(roster.apply(&join("Notch")));

        assert_eq!(roster.count(), 2);
        assert!(roster.names().contains("Steve"));
        assert!(roster.names().contains("Notch"));
        assert!(!roster.names().contains("Alex"));
    }

    #[test]
    fn test_count_never_goes_negative() {
        let mut roster = PlayerRoster::new();

        assert!(!roster.apply(&leave("Ghost")));
        assert_eq!(roster.count(), 0);

        roster.apply(&join("Alex"));
        roster.apply(&leave("Alex"));
        roster.apply(&leave("Alex"));
        assert_eq!(roster.count(), 0);
    }

    #[test]
    fn test_chat_does_not_change_count() {
        let mut roster = PlayerRoster::new();
        let chat = OutputEvent::from_raw("[10:00:00] [Server thread/INFO]: <Alex> hi");
        assert!(!roster.apply(&chat));
        assert_eq!(roster.count(), 0);
    }

    #[test]
    fn test_parse_player_list_formats() {
        let modern = parse_player_list(
            "[10:00:00] [Server thread/INFO]: There are 2 of a max of 20 players online: Alex, Steve",
        )
        .unwrap();
        assert_eq!(modern.count, 2);
        assert_eq!(modern.names, vec!["Alex", "Steve"]);

        let legacy = parse_player_list("There are 0/20 players online:").unwrap();
        assert_eq!(legacy.count, 0);
        assert!(legacy.names.is_empty());

        assert!(parse_player_list("Done (3.2s)!").is_none());
    }

    #[test]
    fn test_list_reply_resyncs_roster() {
        let mut roster = PlayerRoster::new();
        roster.apply(&join("Alex"));

        let reply = OutputEvent::from_raw(
            "[10:00:00] [Server thread/INFO]: There are 3 of a max of 20 players online: Alex, Steve, Notch",
        );
        assert!(roster.apply(&reply));
        assert_eq!(roster.count(), 3);
        assert_eq!(roster.names().len(), 3);

        // Same reply again is not a change
        assert!(!roster.apply(&reply));

        roster.reset();
        assert_eq!(roster.snapshot(), RosterSnapshot::default());
    }

    #[test]
    fn test_list_reply_with_same_count_replaces_names() {
        let mut roster = PlayerRoster::new();
        roster.apply(&join("Bob"));
        roster.apply(&join("Carl"));

        let reply = OutputEvent::from_raw(
            "[10:00:00] [Server thread/INFO]: There are 2 of a max of 20 players online: Alex, Steve",
        );
        assert!(roster.apply(&reply));
        assert_eq!(roster.count(), 2);
        assert_eq!(
            roster.snapshot().names,
            BTreeSet::from(["Alex".to_string(), "Steve".to_string()])
        );
    }
}
