//! Commands served by this bot. One HTTP route is registered per entry.

pub mod jimothy;

use crate::slack::Command;

/// Every command, built once at startup.
pub fn all() -> Vec<Command> {
    vec![jimothy::command()]
}
