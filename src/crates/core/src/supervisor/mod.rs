//! Process supervisor - owns all live PTY sessions
//!
//! The supervisor is the authoritative, addressable registry for every child
//! process in the application. It is the only component permitted to call
//! PTY endpoints directly. Each public operation is keyed by an opaque
//! session id, looks up exactly one record, and never touches any other
//! record as a side effect: writes to tab A can never reach tab B's PTY.
//!
//! Lifecycle: a record enters the map only via a successful spawn and leaves
//! only via explicit `kill`, the PTY exit event, or `kill_all`. Exit-driven
//! removal is the only path that publishes an `Exit` event, and the record
//! is removed from the map before the event is dispatched. An explicit kill
//! removes the record synchronously; the PTY's own exit event that follows
//! finds the record absent and becomes a no-op.

use std::collections::HashMap;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::Stream;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{self, SupervisorConfig};
use crate::events::{EventDispatcher, SubscriptionId, SupervisorEvent};
use crate::pty::{self, PtyController, PtyEvent, PtyEventStream, PtySpawnSpec, PtyWriter, SpawnedPty};

/// Tool type that maps a generic spawn onto a terminal-tab record.
pub const EMBEDDED_TERMINAL_TOOL: &str = "embedded-terminal";

/// Largest grid dimension accepted by `resize`.
const MAX_GRID_DIMENSION: u16 = 500;

/// Marker distinguishing UI terminal tabs from background agent processes.
///
/// Only `TerminalTab` records publish bytes on the `raw-pty-data` stream;
/// agent records use the agent stream so tab renderers never see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    TerminalTab,
    AgentProcess,
}

/// A live session owned by the supervisor.
struct SessionRecord {
    pid: u32,
    cwd: String,
    kind: SessionKind,
    created_at: DateTime<Utc>,
    writer: PtyWriter,
    controller: PtyController,
}

/// Read-only snapshot of a session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub pid: u32,
    pub cwd: String,
    pub kind: SessionKind,
    pub created_at: DateTime<Utc>,
}

/// Spawn parameters for a terminal tab.
#[derive(Debug, Clone)]
pub struct TerminalTabSpec {
    /// Caller-minted opaque session id
    pub session_id: String,
    /// Working directory; must exist and be a directory
    pub cwd: String,
    /// Shell executable; `None` uses the configured or platform default
    pub shell: Option<String>,
    pub shell_args: Vec<String>,
    pub shell_env: HashMap<String, String>,
    /// Initial grid; `None` uses the configured default (80x24)
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

/// Spawn parameters for a generic child process reusing the same lifecycle
/// machinery (agent processes, background tools).
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub session_id: String,
    /// Tool discriminator; `"embedded-terminal"` yields a terminal-tab record
    pub tool_type: String,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: String,
    pub env: HashMap<String, String>,
    pub cols: Option<u16>,
    pub rows: Option<u16>,
}

/// In-band spawn outcome - the only user-visible error path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnResponse {
    pub success: bool,
    /// OS process id on success, `-1` on failure
    pub pid: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SpawnResponse {
    pub fn ok(pid: u32) -> Self {
        Self {
            success: true,
            pid: pid as i32,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pid: -1,
            error: Some(message.into()),
        }
    }
}

/// Stream of supervisor events (channel-backed subscription).
pub type EventStream = Pin<Box<dyn Stream<Item = SupervisorEvent> + Send>>;

struct Inner {
    config: SupervisorConfig,
    sessions: DashMap<String, SessionRecord>,
    dispatcher: EventDispatcher,
    next_pty_id: AtomicU32,
}

/// Owns and manages all PTY sessions for the application lifetime.
///
/// Wraps an `Arc` so it can be cheaply cloned into app-managed state and
/// shared across handlers. Public operations are synchronous and atomic per
/// call; records are inserted with their event forwarding already attached,
/// so no caller ever observes a half-initialized session.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Supervisor {
    /// Create a supervisor with the given configuration.
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sessions: DashMap::new(),
                dispatcher: EventDispatcher::new(),
                next_pty_id: AtomicU32::new(1),
            }),
        }
    }

    /// Create a supervisor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(SupervisorConfig::default())
    }

    /// Supervisor configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Spawn a shell in a new PTY bound to a terminal tab.
    ///
    /// The default shell is platform-appropriate (`$SHELL` on Unix,
    /// `%COMSPEC%` on Windows); the base environment always carries `PATH`,
    /// `TERM=xterm-256color` and `HOME`, with configured and per-spawn
    /// variables merged over it. Must be called within a tokio runtime.
    pub fn spawn_terminal_tab(&self, spec: TerminalTabSpec) -> SpawnResponse {
        let shell = spec.shell.unwrap_or_else(|| {
            self.inner
                .config
                .default_shell
                .clone()
                .unwrap_or_else(config::default_shell_executable)
        });

        let pty_spec = PtySpawnSpec {
            executable: shell,
            args: spec.shell_args,
            cwd: spec.cwd,
            env: self.merged_env(spec.shell_env),
            cols: spec.cols.unwrap_or(self.inner.config.default_cols),
            rows: spec.rows.unwrap_or(self.inner.config.default_rows),
        };

        self.spawn_with_kind(spec.session_id, pty_spec, SessionKind::TerminalTab)
    }

    /// Spawn a generic child process through the same lifecycle machinery.
    ///
    /// Records spawned with `tool_type != "embedded-terminal"` are marked
    /// `AgentProcess` and publish on the agent stream instead of
    /// `raw-pty-data`.
    pub fn spawn(&self, spec: ProcessSpec) -> SpawnResponse {
        let kind = if spec.tool_type == EMBEDDED_TERMINAL_TOOL {
            SessionKind::TerminalTab
        } else {
            SessionKind::AgentProcess
        };

        let pty_spec = PtySpawnSpec {
            executable: spec.command,
            args: spec.args,
            cwd: spec.cwd,
            env: self.merged_env(spec.env),
            cols: spec.cols.unwrap_or(self.inner.config.default_cols),
            rows: spec.rows.unwrap_or(self.inner.config.default_rows),
        };

        self.spawn_with_kind(spec.session_id, pty_spec, kind)
    }

    fn merged_env(&self, extra: HashMap<String, String>) -> HashMap<String, String> {
        let mut env = config::base_environment();
        env.extend(self.inner.config.env.clone());
        env.extend(extra);
        env
    }

    fn spawn_with_kind(
        &self,
        session_id: String,
        mut pty_spec: PtySpawnSpec,
        kind: SessionKind,
    ) -> SpawnResponse {
        if session_id.is_empty() {
            return SpawnResponse::failed("session id must not be empty");
        }
        if self.inner.sessions.contains_key(&session_id) {
            return SpawnResponse::failed(format!("session '{session_id}' already exists"));
        }

        // Validate cwd before touching the OS PTY: must exist and be a
        // directory. Canonicalized so the record holds a stable path.
        match Path::new(&pty_spec.cwd).canonicalize() {
            Ok(canonical) if canonical.is_dir() => {
                pty_spec.cwd = canonical.to_string_lossy().into_owned();
            }
            Ok(_) => {
                return SpawnResponse::failed(format!(
                    "cwd '{}' is not a directory",
                    pty_spec.cwd
                ));
            }
            Err(e) => {
                return SpawnResponse::failed(format!("invalid cwd '{}': {e}", pty_spec.cwd));
            }
        }

        let pty_id = self.inner.next_pty_id.fetch_add(1, Ordering::Relaxed);
        let spawned = match pty::spawn_pty(pty_id, &pty_spec) {
            Ok(spawned) => spawned,
            Err(e) => {
                warn!("Spawn failed for session {session_id}: {e}");
                return SpawnResponse::failed(e.to_string());
            }
        };

        let pid = spawned.info.pid;
        self.register(session_id.clone(), pty_spec.cwd, kind, spawned);
        info!("Spawned session {session_id} (pid={pid}, kind={kind:?})");
        SpawnResponse::ok(pid)
    }

    /// Insert a record and attach its event forwarding in one step.
    fn register(&self, session_id: String, cwd: String, kind: SessionKind, spawned: SpawnedPty) {
        let SpawnedPty {
            info,
            writer,
            controller,
            events,
        } = spawned;

        let record = SessionRecord {
            pid: info.pid,
            cwd,
            kind,
            created_at: Utc::now(),
            writer,
            controller,
        };
        self.inner.sessions.insert(session_id.clone(), record);
        self.forward_events(session_id, kind, events);
    }

    /// Per-record forwarding task: the single consumer of the PTY's event
    /// stream, which is what preserves per-session ordering (data events in
    /// PTY order, exit strictly last, cross-session order unspecified).
    fn forward_events(&self, session_id: String, kind: SessionKind, mut events: PtyEventStream) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PtyEvent::Data(bytes) => {
                        let event = match kind {
                            SessionKind::TerminalTab => SupervisorEvent::RawPtyData {
                                session_id: session_id.clone(),
                                bytes,
                            },
                            SessionKind::AgentProcess => SupervisorEvent::AgentData {
                                session_id: session_id.clone(),
                                bytes,
                            },
                        };
                        inner.dispatcher.dispatch(&event);
                    }
                    PtyEvent::Exit { exit_code } => {
                        // Remove before emitting so subscribers observe the
                        // map without the exited session. A record already
                        // removed by an explicit kill suppresses the event.
                        if inner.sessions.remove(&session_id).is_some() {
                            info!("Session {session_id} exited with code {exit_code}");
                            inner.dispatcher.dispatch(&SupervisorEvent::Exit {
                                session_id: session_id.clone(),
                                exit_code,
                            });
                        } else {
                            debug!("Session {session_id}: exit after explicit kill, ignored");
                        }
                        break;
                    }
                }
            }
        });
    }

    /// Snapshot of one session, or `None` if unknown.
    pub fn get(&self, session_id: &str) -> Option<SessionView> {
        self.inner.sessions.get(session_id).map(|record| SessionView {
            session_id: session_id.to_string(),
            pid: record.pid,
            cwd: record.cwd.clone(),
            kind: record.kind,
            created_at: record.created_at,
        })
    }

    /// Snapshot of all sessions. Order is not guaranteed.
    pub fn get_all(&self) -> Vec<SessionView> {
        self.inner
            .sessions
            .iter()
            .map(|entry| SessionView {
                session_id: entry.key().clone(),
                pid: entry.value().pid,
                cwd: entry.value().cwd.clone(),
                kind: entry.value().kind,
                created_at: entry.value().created_at,
            })
            .collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Write raw bytes to a session's PTY stdin.
    ///
    /// Returns `true` if the record is present and the write was dispatched;
    /// `false` otherwise. An unknown session is not an error - it is the
    /// normal race outcome when a tab is closed between a user gesture and
    /// the dispatch.
    pub fn write(&self, session_id: &str, data: &[u8]) -> bool {
        match self.inner.sessions.get(session_id) {
            Some(record) => record.writer.try_write(data),
            None => false,
        }
    }

    /// Resize a session's PTY grid. Dimensions of zero or above 500 are
    /// rejected.
    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> bool {
        if cols == 0 || rows == 0 || cols > MAX_GRID_DIMENSION || rows > MAX_GRID_DIMENSION {
            warn!("Rejected resize for {session_id}: {cols}x{rows}");
            return false;
        }
        match self.inner.sessions.get(session_id) {
            Some(record) => record.controller.try_resize(cols, rows),
            None => false,
        }
    }

    /// Interrupt the foreground program: writes the single byte ETX (0x03),
    /// the same as the user pressing Ctrl+C. Defined as a write rather than
    /// an OS signal so the shell's own interpretation applies and the
    /// failure modes are identical to `write`.
    pub fn interrupt(&self, session_id: &str) -> bool {
        self.write(session_id, &[0x03])
    }

    /// Kill a session: removes the record synchronously and shuts the PTY
    /// down. Returns `true` if the record was present. Does NOT publish an
    /// `Exit` event; the PTY's own exit that follows finds the record gone.
    pub fn kill(&self, session_id: &str) -> bool {
        match self.inner.sessions.remove(session_id) {
            Some((_, record)) => {
                record.controller.shutdown();
                info!("Killed session {session_id}");
                true
            }
            None => false,
        }
    }

    /// Kill every session. Idempotent; returns the number killed.
    pub fn kill_all(&self) -> usize {
        let ids: Vec<String> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut killed = 0;
        for id in ids {
            if self.kill(&id) {
                killed += 1;
            }
        }
        if killed > 0 {
            info!("Killed {killed} session(s)");
        }
        killed
    }

    /// Register an event subscriber. Callbacks run on the supervisor's
    /// forwarding context and must not mutate supervisor state re-entrantly;
    /// a `kill` issued for the exiting session from an exit handler
    /// correctly returns `false`.
    pub fn on<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SupervisorEvent) + Send + Sync + 'static,
    {
        self.inner.dispatcher.on(callback)
    }

    /// Remove an event subscriber.
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.dispatcher.off(id)
    }

    /// Channel-backed event subscription.
    ///
    /// The underlying subscription lives for the supervisor's lifetime;
    /// events arriving after the stream is dropped are discarded.
    pub fn event_stream(&self) -> EventStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.on(move |event| {
            let _ = tx.send(event.clone());
        });
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }

    /// Insert a channel-backed fake session, bypassing the OS PTY. The
    /// returned probe observes dispatched commands and injects events.
    #[cfg(test)]
    pub(crate) fn register_fake(
        &self,
        session_id: &str,
        kind: SessionKind,
    ) -> (
        tokio::sync::mpsc::Receiver<crate::pty::PtyCommand>,
        tokio::sync::mpsc::Sender<PtyEvent>,
    ) {
        let pty_id = self.inner.next_pty_id.fetch_add(1, Ordering::Relaxed);
        let (spawned, command_rx, event_tx) = pty::channel_pty(pty_id, 40_000 + pty_id, "/tmp");
        self.register(session_id.to_string(), "/tmp".to_string(), kind, spawned);
        (command_rx, event_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::PtyCommand;
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    async fn next_event(stream: &mut EventStream) -> SupervisorEvent {
        timeout(RECV_TIMEOUT, stream.next())
            .await
            .expect("timed out waiting for supervisor event")
            .expect("event stream ended")
    }

    #[tokio::test]
    async fn write_routes_to_exactly_one_session() {
        let supervisor = Supervisor::with_defaults();
        let (mut rx0, _e0) = supervisor.register_fake("t0", SessionKind::TerminalTab);
        let (mut rx1, _e1) = supervisor.register_fake("t1", SessionKind::TerminalTab);
        let (mut rx2, _e2) = supervisor.register_fake("t2", SessionKind::TerminalTab);

        assert!(supervisor.write("t1", b"ls\r"));

        match rx1.try_recv() {
            Ok(PtyCommand::Write(data)) => assert_eq!(data, b"ls\r"),
            other => panic!("expected write on t1, got {other:?}"),
        }
        assert!(rx1.try_recv().is_err(), "exactly one command expected");
        assert!(rx0.try_recv().is_err(), "t0 must see no commands");
        assert!(rx2.try_recv().is_err(), "t2 must see no commands");
    }

    #[tokio::test]
    async fn operations_on_one_session_leave_others_untouched() {
        let supervisor = Supervisor::with_defaults();
        let (mut rx_a, _ea) = supervisor.register_fake("a", SessionKind::TerminalTab);
        let (mut rx_b, _eb) = supervisor.register_fake("b", SessionKind::TerminalTab);

        let b_before = supervisor.get("b").unwrap();

        assert!(supervisor.write("a", b"x"));
        assert!(supervisor.resize("a", 100, 30));
        assert!(supervisor.interrupt("a"));
        assert!(supervisor.kill("a"));

        let b_after = supervisor.get("b").unwrap();
        assert_eq!(b_before.pid, b_after.pid);
        assert_eq!(b_before.cwd, b_after.cwd);
        assert_eq!(b_before.created_at, b_after.created_at);
        assert!(rx_b.try_recv().is_err(), "b's PTY saw no calls");

        // a received exactly the dispatched commands, ending with shutdown
        assert!(matches!(rx_a.try_recv(), Ok(PtyCommand::Write(_))));
        assert!(matches!(rx_a.try_recv(), Ok(PtyCommand::Resize { .. })));
        match rx_a.try_recv() {
            Ok(PtyCommand::Write(data)) => assert_eq!(data, vec![0x03]),
            other => panic!("expected interrupt write, got {other:?}"),
        }
        assert!(matches!(rx_a.try_recv(), Ok(PtyCommand::Shutdown)));
    }

    #[tokio::test]
    async fn per_session_fanout_preserves_order() {
        let supervisor = Supervisor::with_defaults();
        let (_r0, e0) = supervisor.register_fake("t0", SessionKind::TerminalTab);
        let (_r1, e1) = supervisor.register_fake("t1", SessionKind::TerminalTab);
        let (_r2, e2) = supervisor.register_fake("t2", SessionKind::TerminalTab);
        let mut stream = supervisor.event_stream();

        e0.send(PtyEvent::Data(b"A1".to_vec())).await.unwrap();
        e1.send(PtyEvent::Data(b"B1".to_vec())).await.unwrap();
        e0.send(PtyEvent::Data(b"A2".to_vec())).await.unwrap();
        e2.send(PtyEvent::Data(b"C1".to_vec())).await.unwrap();
        e1.send(PtyEvent::Data(b"B2".to_vec())).await.unwrap();
        e0.send(PtyEvent::Data(b"A3".to_vec())).await.unwrap();

        let mut per_session: std::collections::HashMap<String, Vec<Vec<u8>>> =
            std::collections::HashMap::new();
        for _ in 0..6 {
            match next_event(&mut stream).await {
                SupervisorEvent::RawPtyData { session_id, bytes } => {
                    per_session.entry(session_id).or_default().push(bytes);
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        assert_eq!(per_session["t0"], vec![b"A1".to_vec(), b"A2".to_vec(), b"A3".to_vec()]);
        assert_eq!(per_session["t1"], vec![b"B1".to_vec(), b"B2".to_vec()]);
        assert_eq!(per_session["t2"], vec![b"C1".to_vec()]);
    }

    #[tokio::test]
    async fn crash_in_one_session_leaves_others_live() {
        let supervisor = Supervisor::with_defaults();
        let (_r0, e0) = supervisor.register_fake("t0", SessionKind::TerminalTab);
        let (_r1, e1) = supervisor.register_fake("t1", SessionKind::TerminalTab);
        let (_r2, _e2) = supervisor.register_fake("t2", SessionKind::TerminalTab);
        let mut stream = supervisor.event_stream();

        e0.send(PtyEvent::Exit { exit_code: 130 }).await.unwrap();

        match next_event(&mut stream).await {
            SupervisorEvent::Exit {
                session_id,
                exit_code,
            } => {
                assert_eq!(session_id, "t0");
                assert_eq!(exit_code, 130);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(supervisor.get("t0").is_none());
        assert!(supervisor.get("t1").is_some());
        assert!(supervisor.get("t2").is_some());

        // Surviving sessions still publish data
        e1.send(PtyEvent::Data(b"still here".to_vec())).await.unwrap();
        match next_event(&mut stream).await {
            SupervisorEvent::RawPtyData { session_id, bytes } => {
                assert_eq!(session_id, "t1");
                assert_eq!(bytes, b"still here");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn data_events_precede_the_single_exit() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, event_tx) = supervisor.register_fake("t", SessionKind::TerminalTab);
        let mut stream = supervisor.event_stream();

        event_tx.send(PtyEvent::Data(b"a".to_vec())).await.unwrap();
        event_tx.send(PtyEvent::Data(b"b".to_vec())).await.unwrap();
        event_tx.send(PtyEvent::Exit { exit_code: 0 }).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(next_event(&mut stream).await);
        }

        assert!(matches!(&seen[0], SupervisorEvent::RawPtyData { bytes, .. } if bytes == b"a"));
        assert!(matches!(&seen[1], SupervisorEvent::RawPtyData { bytes, .. } if bytes == b"b"));
        assert!(matches!(&seen[2], SupervisorEvent::Exit { exit_code: 0, .. }));
    }

    #[tokio::test]
    async fn record_is_removed_before_exit_is_published() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, event_tx) = supervisor.register_fake("t", SessionKind::TerminalTab);

        let observed = Arc::new(Mutex::new(None));
        let observer = observed.clone();
        let sup = supervisor.clone();
        supervisor.on(move |event| {
            if let SupervisorEvent::Exit { session_id, .. } = event {
                *observer.lock().unwrap() = Some(sup.get(session_id).is_none());
            }
        });

        event_tx.send(PtyEvent::Exit { exit_code: 1 }).await.unwrap();

        timeout(RECV_TIMEOUT, async {
            loop {
                if observed.lock().unwrap().is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("exit event never observed");

        assert_eq!(*observed.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn dead_session_refuses_every_operation() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, _event_tx) = supervisor.register_fake("t", SessionKind::TerminalTab);

        assert!(supervisor.kill("t"));
        assert!(!supervisor.write("t", b"x"));
        assert!(!supervisor.resize("t", 80, 24));
        assert!(!supervisor.interrupt("t"));
        assert!(!supervisor.kill("t"));
        assert!(supervisor.get("t").is_none());
    }

    #[tokio::test]
    async fn exit_after_explicit_kill_is_suppressed() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, event_tx) = supervisor.register_fake("t", SessionKind::TerminalTab);

        let exit_count = Arc::new(AtomicUsize::new(0));
        let counter = exit_count.clone();
        supervisor.on(move |event| {
            if matches!(event, SupervisorEvent::Exit { .. }) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        assert!(supervisor.kill("t"));
        // The kill signal also triggers the PTY's own exit; the record is
        // already absent so it must not be re-published.
        event_tx.send(PtyEvent::Exit { exit_code: 137 }).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(exit_count.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn kill_all_is_idempotent() {
        let supervisor = Supervisor::with_defaults();
        let (_ra, _ea) = supervisor.register_fake("a", SessionKind::TerminalTab);
        let (_rb, _eb) = supervisor.register_fake("b", SessionKind::AgentProcess);

        assert_eq!(supervisor.kill_all(), 2);
        assert_eq!(supervisor.session_count(), 0);
        assert_eq!(supervisor.kill_all(), 0);
        assert!(!supervisor.write("a", b"x"));
        assert!(supervisor.get_all().is_empty());
    }

    #[tokio::test]
    async fn agent_records_publish_on_the_agent_stream() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, event_tx) = supervisor.register_fake("agent", SessionKind::AgentProcess);
        let mut stream = supervisor.event_stream();

        event_tx.send(PtyEvent::Data(b"tool output".to_vec())).await.unwrap();

        match next_event(&mut stream).await {
            SupervisorEvent::AgentData { session_id, bytes } => {
                assert_eq!(session_id, "agent");
                assert_eq!(bytes, b"tool output");
            }
            other => panic!("agent data expected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resize_validates_dimensions() {
        let supervisor = Supervisor::with_defaults();
        let (mut rx, _event_tx) = supervisor.register_fake("t", SessionKind::TerminalTab);

        assert!(!supervisor.resize("t", 0, 24));
        assert!(!supervisor.resize("t", 80, 0));
        assert!(!supervisor.resize("t", 501, 24));
        assert!(rx.try_recv().is_err(), "rejected resizes must not reach the PTY");

        assert!(supervisor.resize("t", 500, 500));
        assert!(matches!(
            rx.try_recv(),
            Ok(PtyCommand::Resize {
                cols: 500,
                rows: 500
            })
        ));
    }

    #[tokio::test]
    async fn spawn_rejects_invalid_cwd_in_band() {
        let supervisor = Supervisor::with_defaults();
        let response = supervisor.spawn_terminal_tab(TerminalTabSpec {
            session_id: "s1".to_string(),
            cwd: "/definitely/not/a/real/directory".to_string(),
            shell: None,
            shell_args: Vec::new(),
            shell_env: HashMap::new(),
            cols: None,
            rows: None,
        });

        assert!(!response.success);
        assert_eq!(response.pid, -1);
        assert!(response.error.is_some());
        assert!(supervisor.get("s1").is_none());
    }

    #[tokio::test]
    async fn spawn_rejects_duplicate_session_id_in_band() {
        let supervisor = Supervisor::with_defaults();
        let (_rx, _event_tx) = supervisor.register_fake("s1", SessionKind::TerminalTab);
        let dir = tempfile::tempdir().unwrap();

        let response = supervisor.spawn_terminal_tab(TerminalTabSpec {
            session_id: "s1".to_string(),
            cwd: dir.path().to_string_lossy().into_owned(),
            shell: None,
            shell_args: Vec::new(),
            shell_env: HashMap::new(),
            cols: None,
            rows: None,
        });

        assert!(!response.success);
        assert_eq!(response.pid, -1);
        let error = response.error.unwrap();
        assert!(error.contains("already exists"), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn spawn_rejects_missing_executable_in_band() {
        let supervisor = Supervisor::with_defaults();
        let dir = tempfile::tempdir().unwrap();

        let response = supervisor.spawn(ProcessSpec {
            session_id: "s1".to_string(),
            tool_type: "code-agent".to_string(),
            command: "/no/such/executable-for-termdock".to_string(),
            args: Vec::new(),
            cwd: dir.path().to_string_lossy().into_owned(),
            env: HashMap::new(),
            cols: None,
            rows: None,
        });

        assert!(!response.success);
        assert_eq!(response.pid, -1);
        assert!(supervisor.get("s1").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reopened_tab_spawns_under_its_new_id() {
        use crate::tabs::{Session, TabIdMinter};

        let supervisor = Supervisor::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_string_lossy().into_owned();
        let minter = TabIdMinter::new();

        // Create a tab and spawn its shell.
        let created = Session::new("ai-default").create_terminal_tab(
            &minter,
            cwd.clone(),
            Some("Dev Server".to_string()),
        );
        let old_id = created.tab.id.clone();
        let response = supervisor.spawn_terminal_tab(TerminalTabSpec {
            session_id: old_id.clone(),
            cwd: cwd.clone(),
            shell: Some("/bin/sh".to_string()),
            shell_args: Vec::new(),
            shell_env: HashMap::new(),
            cols: None,
            rows: None,
        });
        assert!(response.success, "spawn failed: {:?}", response.error);

        // Close the tab; the matching supervisor call is a kill.
        let closed = created.session.close_terminal_tab(&old_id).unwrap();
        assert!(supervisor.kill(&old_id));

        // Reopen: same cwd and name, fresh id, runtime state reset.
        let reopened = closed.reopen_unified_closed_tab(&minter).unwrap();
        assert_ne!(reopened.tab_id, old_id);
        let tab = reopened.session.terminal_tab(&reopened.tab_id).unwrap();
        assert_eq!(tab.cwd, cwd);
        assert_eq!(tab.name.as_deref(), Some("Dev Server"));
        assert!(!tab.process_running);
        assert_eq!(tab.exit_code, None);

        // Spawning under the new id binds the preserved cwd.
        let response = supervisor.spawn_terminal_tab(TerminalTabSpec {
            session_id: reopened.tab_id.clone(),
            cwd: tab.cwd.clone(),
            shell: Some("/bin/sh".to_string()),
            shell_args: Vec::new(),
            shell_env: HashMap::new(),
            cols: None,
            rows: None,
        });
        assert!(response.success, "respawn failed: {:?}", response.error);

        let view = supervisor.get(&reopened.tab_id).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(view.cwd, canonical.to_string_lossy());
        assert!(supervisor.get(&old_id).is_none(), "old id stays dead");

        supervisor.kill_all();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_child_roundtrip() {
        let supervisor = Supervisor::with_defaults();
        let dir = tempfile::tempdir().unwrap();
        let mut stream = supervisor.event_stream();

        let response = supervisor.spawn(ProcessSpec {
            session_id: "echo".to_string(),
            tool_type: EMBEDDED_TERMINAL_TOOL.to_string(),
            command: "/bin/echo".to_string(),
            args: vec!["termdock-roundtrip".to_string()],
            cwd: dir.path().to_string_lossy().into_owned(),
            env: HashMap::new(),
            cols: Some(80),
            rows: Some(24),
        });
        assert!(response.success, "spawn failed: {:?}", response.error);
        assert!(response.pid > 0);

        let mut output = Vec::new();
        let exit_code = loop {
            match next_event(&mut stream).await {
                SupervisorEvent::RawPtyData { bytes, .. } => output.extend_from_slice(&bytes),
                SupervisorEvent::Exit { exit_code, .. } => break exit_code,
                SupervisorEvent::AgentData { .. } => panic!("terminal kind expected"),
            }
        };

        assert_eq!(exit_code, 0);
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("termdock-roundtrip"), "output: {text:?}");
        assert!(supervisor.get("echo").is_none(), "record reaped after exit");
    }
}
