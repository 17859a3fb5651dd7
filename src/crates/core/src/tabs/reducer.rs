//! Pure operations over `Session` values
//!
//! Every operation takes `&self` and returns a fresh `Session` (wrapped in
//! an outcome type where the operation produces more than the state).
//! Unknown ids yield `None`; no operation panics.

use chrono::Utc;

use super::{
    ClosedTabSnapshot, Session, TabIdMinter, TabKind, TerminalTab, UnifiedTabRef,
    MAX_CLOSED_TAB_HISTORY,
};

/// Outcome of `create_terminal_tab`.
#[derive(Debug, Clone)]
pub struct CreatedTab {
    pub session: Session,
    pub tab: TerminalTab,
}

/// Outcome of `reopen_unified_closed_tab`.
#[derive(Debug, Clone)]
pub struct ReopenedTab {
    pub session: Session,
    pub tab_id: String,
    pub kind: TabKind,
}

impl Session {
    /// Append a new terminal tab and make it active. The caller is expected
    /// to spawn the matching supervisor session afterwards.
    pub fn create_terminal_tab(
        &self,
        minter: &TabIdMinter,
        cwd: impl Into<String>,
        name: Option<String>,
    ) -> CreatedTab {
        let tab = TerminalTab {
            id: minter.mint(),
            cwd: cwd.into(),
            name,
            process_running: false,
            exit_code: None,
        };

        let mut next = self.clone();
        next.terminal_tabs.push(tab.clone());
        next.active_terminal_tab_id = Some(tab.id.clone());
        next.unified_tab_order.push(UnifiedTabRef::terminal(&tab.id));
        next.active_unified_tab = Some(UnifiedTabRef::terminal(&tab.id));

        CreatedTab { session: next, tab }
    }

    /// Close a terminal tab: remove it from the open set and the unified
    /// order, archive a snapshot for reopen, and elect a new active tab.
    ///
    /// Returns `None` if `tab_id` is not an open terminal tab. Closing a tab
    /// whose process already exited is valid; process state is never
    /// consulted here.
    pub fn close_terminal_tab(&self, tab_id: &str) -> Option<Session> {
        let index = self.terminal_index(tab_id)?;

        let mut next = self.clone();
        let closed = next.terminal_tabs.remove(index);
        let closed_ref = UnifiedTabRef::terminal(&closed.id);
        next.unified_tab_order.retain(|r| *r != closed_ref);
        next.push_snapshot(ClosedTabSnapshot {
            kind: TabKind::Terminal,
            id: closed.id.clone(),
            cwd: closed.cwd.clone(),
            name: closed.name.clone(),
            closed_at: Utc::now(),
        });

        if next.active_terminal_tab_id.as_deref() == Some(tab_id) {
            // Prefer the neighbour to the right (now at the same index),
            // else the one to the left.
            let replacement = next
                .terminal_tabs
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| next.terminal_tabs.get(i)))
                .map(|tab| tab.id.clone());
            next.active_terminal_tab_id = replacement;
        }

        if next.active_unified_tab.as_ref() == Some(&closed_ref) {
            next.active_unified_tab = match &next.active_terminal_tab_id {
                Some(id) => Some(UnifiedTabRef::terminal(id)),
                // No terminal tabs remain: the default AI tab takes focus.
                None => Some(UnifiedTabRef::ai(&next.default_ai_tab_id)),
            };
        }

        Some(next)
    }

    /// Reopen the most recently closed tab.
    ///
    /// Terminal snapshots reconstruct a fresh tab: new id, preserved cwd and
    /// name, runtime state reset (the PTY is spawned externally). AI and
    /// file snapshots are UI-owned and re-enter the unified order under
    /// their archived id. Returns `None` if the history is empty.
    pub fn reopen_unified_closed_tab(&self, minter: &TabIdMinter) -> Option<ReopenedTab> {
        let snapshot = self.unified_closed_tab_history.last()?.clone();

        let mut next = self.clone();
        next.unified_closed_tab_history.pop();

        match snapshot.kind {
            TabKind::Terminal => {
                let tab = TerminalTab {
                    id: minter.mint(),
                    cwd: snapshot.cwd,
                    name: snapshot.name,
                    process_running: false,
                    exit_code: None,
                };
                next.terminal_tabs.push(tab.clone());
                next.active_terminal_tab_id = Some(tab.id.clone());
                next.unified_tab_order.push(UnifiedTabRef::terminal(&tab.id));
                next.active_unified_tab = Some(UnifiedTabRef::terminal(&tab.id));
                Some(ReopenedTab {
                    session: next,
                    tab_id: tab.id,
                    kind: TabKind::Terminal,
                })
            }
            kind => {
                let restored = UnifiedTabRef {
                    kind,
                    id: snapshot.id.clone(),
                };
                next.unified_tab_order.push(restored.clone());
                next.active_unified_tab = Some(restored);
                Some(ReopenedTab {
                    session: next,
                    tab_id: snapshot.id,
                    kind,
                })
            }
        }
    }

    /// Focus the next tab in the unified order, wrapping at the end.
    pub fn navigate_to_next_unified_tab(&self) -> Session {
        self.rotate_unified(1)
    }

    /// Focus the previous tab in the unified order, wrapping at the start.
    pub fn navigate_to_prev_unified_tab(&self) -> Session {
        self.rotate_unified(-1)
    }

    fn rotate_unified(&self, step: isize) -> Session {
        if self.unified_tab_order.is_empty() {
            return self.clone();
        }
        let len = self.unified_tab_order.len() as isize;
        let current = self
            .active_unified_tab
            .as_ref()
            .and_then(|active| self.unified_index(active))
            .unwrap_or(0) as isize;
        let target = (current + step).rem_euclid(len) as usize;

        let mut next = self.clone();
        next.focus_unified(self.unified_tab_order[target].clone());
        next
    }

    /// Focus a tab by 1-based position in the unified order. Out-of-range
    /// indices return `None`.
    pub fn navigate_to_unified_tab_by_index(&self, index: usize) -> Option<Session> {
        if index == 0 || index > self.unified_tab_order.len() {
            return None;
        }
        let mut next = self.clone();
        next.focus_unified(self.unified_tab_order[index - 1].clone());
        Some(next)
    }

    /// Set or clear a terminal tab's display name.
    pub fn rename_terminal_tab(&self, tab_id: &str, name: Option<String>) -> Option<Session> {
        let index = self.terminal_index(tab_id)?;
        let mut next = self.clone();
        next.terminal_tabs[index].name = name;
        Some(next)
    }

    /// Close every terminal tab except `keep_id`. Equivalent to iterating
    /// `close_terminal_tab`; snapshots are archived in display order.
    pub fn close_other_terminal_tabs(&self, keep_id: &str) -> Option<Session> {
        self.terminal_index(keep_id)?;
        let to_close: Vec<String> = self
            .terminal_tabs
            .iter()
            .filter(|tab| tab.id != keep_id)
            .map(|tab| tab.id.clone())
            .collect();

        let mut next = self.clone();
        for id in to_close {
            if let Some(session) = next.close_terminal_tab(&id) {
                next = session;
            }
        }
        Some(next)
    }

    /// Close every terminal tab appearing after `pivot_id` in display order.
    pub fn close_terminal_tabs_to_right(&self, pivot_id: &str) -> Option<Session> {
        let pivot = self.terminal_index(pivot_id)?;
        let to_close: Vec<String> = self.terminal_tabs[pivot + 1..]
            .iter()
            .map(|tab| tab.id.clone())
            .collect();

        let mut next = self.clone();
        for id in to_close {
            if let Some(session) = next.close_terminal_tab(&id) {
                next = session;
            }
        }
        Some(next)
    }

    /// Record that the tab's process started or stopped running. Used by the
    /// caller to mirror supervisor state into the UI.
    pub fn set_process_running(&self, tab_id: &str, running: bool) -> Option<Session> {
        let index = self.terminal_index(tab_id)?;
        let mut next = self.clone();
        next.terminal_tabs[index].process_running = running;
        Some(next)
    }

    /// Record a process exit (or a spawn failure as exit code `-1`).
    pub fn record_exit(&self, tab_id: &str, exit_code: i32) -> Option<Session> {
        let index = self.terminal_index(tab_id)?;
        let mut next = self.clone();
        next.terminal_tabs[index].process_running = false;
        next.terminal_tabs[index].exit_code = Some(exit_code);
        Some(next)
    }

    fn push_snapshot(&mut self, snapshot: ClosedTabSnapshot) {
        self.unified_closed_tab_history.push(snapshot);
        if self.unified_closed_tab_history.len() > MAX_CLOSED_TAB_HISTORY {
            self.unified_closed_tab_history.remove(0);
        }
    }

    fn focus_unified(&mut self, target: UnifiedTabRef) {
        if target.kind == TabKind::Terminal {
            self.active_terminal_tab_id = Some(target.id.clone());
        }
        self.active_unified_tab = Some(target);
    }
}
