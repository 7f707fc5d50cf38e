//! Output classification for MC Runner.
//!
//! Every line the server prints is cleaned of terminal control sequences and
//! sorted into one of four streams: chat, join, leave or plain log. The
//! [`PlayerRoster`] turns the ordered join/leave stream (and replies to `list`)
//! into a player count.
//!
//! Detection is purely structural. A chat line is one carrying `]: <name>`
//! after the log prefix; joins and leaves end in the vanilla marker phrases.
//! Known lines this reads as plain log: console `say` broadcasts (`[Server] ...`),
//! `/me` emotes (`* name ...`), and chat from plugins that rewrite the `<name>` format.
mod classifier;
mod players;

pub use classifier::{
    Classification, OutputCategory, OutputEvent, classify, strip_control_sequences,
};
pub use players::{PlayerList, PlayerRoster, RosterSnapshot, parse_player_list};
