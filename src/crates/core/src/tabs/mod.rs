//! Tabs module - Immutable tab state and the pure reducer over it
//!
//! The `Session` value mirrors the supervisor's process population in
//! UI-visible state. It holds no pointers to live PTYs; the join key between
//! the two worlds is the opaque session id. All operations are pure: the
//! input value is never mutated and every operation returns a new `Session`.
//! Concurrency lives entirely in the supervisor.

mod reducer;

pub use reducer::{CreatedTab, ReopenedTab};

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of closed-tab snapshots retained for reopen. Oldest
/// snapshots are dropped first.
pub const MAX_CLOSED_TAB_HISTORY: usize = 50;

/// Kind of a tab in the unified order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    Ai,
    Terminal,
    File,
}

/// One entry of the unified tab order: the concatenated display order across
/// tab kinds, used by navigation shortcuts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedTabRef {
    pub kind: TabKind,
    pub id: String,
}

impl UnifiedTabRef {
    pub fn ai(id: impl Into<String>) -> Self {
        Self {
            kind: TabKind::Ai,
            id: id.into(),
        }
    }

    pub fn terminal(id: impl Into<String>) -> Self {
        Self {
            kind: TabKind::Terminal,
            id: id.into(),
        }
    }
}

/// UI-visible state of one terminal tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalTab {
    /// Opaque session id; the join key with the supervisor's record
    pub id: String,
    /// Working directory the tab's shell runs in
    pub cwd: String,
    /// Optional display name
    pub name: Option<String>,
    /// Mirrors supervisor presence; flipped by the caller after spawn/exit
    pub process_running: bool,
    /// Exit code once the process has exited (`-1` for spawn failure)
    pub exit_code: Option<i32>,
}

/// Archived state of a closed tab, sufficient to reopen it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTabSnapshot {
    pub kind: TabKind,
    /// The id the tab had when it was closed. Dead: terminal reopens mint a
    /// fresh id so stale subscribers can never mis-route.
    pub id: String,
    pub cwd: String,
    pub name: Option<String>,
    pub closed_at: DateTime<Utc>,
}

/// Mints session ids: monotonic within a run, universally unique across
/// runs via a UUID suffix.
#[derive(Debug, Default)]
pub struct TabIdMinter {
    counter: AtomicU64,
}

impl TabIdMinter {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Mint a fresh id. Ids are never reused within a run.
    pub fn mint(&self) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("term-{seq}-{}", &suffix[..8])
    }
}

/// Immutable tab state: the reducer's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Open terminal tabs, in display order
    pub terminal_tabs: Vec<TerminalTab>,
    /// Active terminal tab, or `None` when no terminal tab is open
    pub active_terminal_tab_id: Option<String>,
    /// Concatenated display order across all tab kinds
    pub unified_tab_order: Vec<UnifiedTabRef>,
    /// Overall focused tab across kinds
    pub active_unified_tab: Option<UnifiedTabRef>,
    /// LIFO history of closed tabs, bounded at `MAX_CLOSED_TAB_HISTORY`
    pub unified_closed_tab_history: Vec<ClosedTabSnapshot>,
    /// The always-present AI tab that takes focus when the last terminal
    /// tab closes
    pub default_ai_tab_id: String,
}

impl Session {
    /// New session seeded with the default AI tab, which starts focused.
    pub fn new(default_ai_tab_id: impl Into<String>) -> Self {
        let ai_id = default_ai_tab_id.into();
        Self {
            terminal_tabs: Vec::new(),
            active_terminal_tab_id: None,
            unified_tab_order: vec![UnifiedTabRef::ai(ai_id.clone())],
            active_unified_tab: Some(UnifiedTabRef::ai(ai_id.clone())),
            unified_closed_tab_history: Vec::new(),
            default_ai_tab_id: ai_id,
        }
    }

    /// Look up a terminal tab by id.
    pub fn terminal_tab(&self, id: &str) -> Option<&TerminalTab> {
        self.terminal_tabs.iter().find(|tab| tab.id == id)
    }

    /// The active terminal tab, if any.
    pub fn active_terminal_tab(&self) -> Option<&TerminalTab> {
        self.active_terminal_tab_id
            .as_deref()
            .and_then(|id| self.terminal_tab(id))
    }

    pub(crate) fn terminal_index(&self, id: &str) -> Option<usize> {
        self.terminal_tabs.iter().position(|tab| tab.id == id)
    }

    pub(crate) fn unified_index(&self, target: &UnifiedTabRef) -> Option<usize> {
        self.unified_tab_order.iter().position(|r| r == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_session_focuses_the_default_ai_tab() {
        let session = Session::new("ai-default");
        assert!(session.terminal_tabs.is_empty());
        assert_eq!(session.active_terminal_tab_id, None);
        assert_eq!(session.unified_tab_order, vec![UnifiedTabRef::ai("ai-default")]);
        assert_eq!(session.active_unified_tab, Some(UnifiedTabRef::ai("ai-default")));
    }

    #[test]
    fn minter_is_monotonic_and_unique() {
        let minter = TabIdMinter::new();
        let ids: Vec<String> = (0..100).map(|_| minter.mint()).collect();

        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let sequences: Vec<u64> = ids
            .iter()
            .map(|id| {
                id.split('-')
                    .nth(1)
                    .and_then(|s| s.parse().ok())
                    .expect("id carries a sequence number")
            })
            .collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }
}
