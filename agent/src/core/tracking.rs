//! Parsing of checklist tracking commands.
//!
//! Once a checklist is finalized, short imperative messages like
//! "completed item 2" or "reopen 1.3" update item completion flags without
//! re-entering the build workflow. Parsing is pure; applying the command
//! lives in [`crate::core::memory`].

use regex::Regex;
use std::sync::LazyLock;

/// How the user referred to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    /// 1-based position across the flattened checklist.
    Index(usize),
    /// Dotted identifier as printed in the checklist (e.g. "1.3").
    Identifier(String),
}

/// A recognized tracking command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingCommand {
    pub target: ItemRef,
    /// New value for the completion flag.
    pub completed: bool,
}

static COMPLETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:i(?:'ve| have)?\s+)?(?:completed|finished|done(?:\s+with)?|check(?:ed)?(?:\s+off)?)\s+(?:item\s+)?(\d+(?:\.\d+)*)\s*\.?\s*$",
    )
    .expect("complete pattern should be valid")
});

static REOPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:reopen|uncheck|undo)\s+(?:item\s+)?(\d+(?:\.\d+)*)\s*\.?\s*$")
        .expect("reopen pattern should be valid")
});

/// Parse `message` as a tracking command, `None` when it is free text.
pub fn parse_tracking_command(message: &str) -> Option<TrackingCommand> {
    if let Some(caps) = COMPLETE_RE.captures(message) {
        return Some(TrackingCommand {
            target: item_ref(&caps[1]),
            completed: true,
        });
    }
    if let Some(caps) = REOPEN_RE.captures(message) {
        return Some(TrackingCommand {
            target: item_ref(&caps[1]),
            completed: false,
        });
    }
    None
}

fn item_ref(token: &str) -> ItemRef {
    if token.contains('.') {
        return ItemRef::Identifier(token.to_string());
    }
    match token.parse::<usize>() {
        Ok(index) if index > 0 => ItemRef::Index(index),
        // Leading-zero or overflow oddities fall back to identifier matching.
        _ => ItemRef::Identifier(token.to_string()),
    }
}
