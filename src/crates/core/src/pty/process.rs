//! PTY process management
//!
//! Spawns a child process on the slave side of a pseudoterminal and exposes
//! the master side as independent components:
//! - `PtyWriter`: for writing data to the PTY (clonable)
//! - `PtyEventStream`: for receiving data/exit events (single consumer)
//! - `PtyController`: for resize and shutdown (clonable)
//!
//! Two OS threads back every spawned PTY. A reader thread drains the master
//! until EOF and forwards chunks losslessly. A waiter thread blocks on the
//! child, joins the reader, and only then emits the single `Exit` event —
//! which is what guarantees exit always follows the last data event.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use tokio::sync::mpsc;

use crate::{SupervisorError, SupervisorResult};

/// Commands accepted by a live PTY process.
#[derive(Debug, Clone)]
pub enum PtyCommand {
    /// Write raw bytes to the child's stdin
    Write(Vec<u8>),
    /// Resize the PTY grid (propagates SIGWINCH to the child)
    Resize { cols: u16, rows: u16 },
    /// Kill the child process
    Shutdown,
}

/// Events produced by a PTY process.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    /// Raw bytes read from the PTY master, exactly as the child produced
    /// them: no decoding, no stripping, no framing.
    Data(Vec<u8>),
    /// Child exited. Sent at most once, after the last `Data` event.
    Exit { exit_code: i32 },
}

/// Static information about a spawned PTY.
#[derive(Debug, Clone)]
pub struct PtyInfo {
    /// Internal PTY id (used for thread naming and logs)
    pub id: u32,
    /// OS process id of the child
    pub pid: u32,
    /// Working directory the child was started in
    pub cwd: String,
}

/// Spawn parameters for a PTY child process.
#[derive(Debug, Clone)]
pub struct PtySpawnSpec {
    pub executable: String,
    pub args: Vec<String>,
    pub cwd: String,
    pub env: HashMap<String, String>,
    pub cols: u16,
    pub rows: u16,
}

// ============================================================================
// PtyWriter - For writing data to the PTY
// ============================================================================

/// PTY writer for sending data to the child's stdin.
///
/// Clonable; writes go through the command channel. Once the process is gone
/// the channel is closed and writes degrade to a `false` return.
#[derive(Clone)]
pub struct PtyWriter {
    command_tx: mpsc::Sender<PtyCommand>,
}

impl PtyWriter {
    /// Dispatch a write without blocking. Returns `false` if the command
    /// queue is closed (process gone) or full.
    pub fn try_write(&self, data: &[u8]) -> bool {
        self.command_tx
            .try_send(PtyCommand::Write(data.to_vec()))
            .is_ok()
    }
}

// ============================================================================
// PtyController - For control operations
// ============================================================================

/// PTY controller for resize and shutdown operations. Clonable.
#[derive(Clone)]
pub struct PtyController {
    command_tx: mpsc::Sender<PtyCommand>,
    has_exited: Arc<AtomicBool>,
}

impl PtyController {
    /// Dispatch a resize without blocking. Returns `false` if the process
    /// is gone.
    pub fn try_resize(&self, cols: u16, rows: u16) -> bool {
        self.command_tx
            .try_send(PtyCommand::Resize { cols, rows })
            .is_ok()
    }

    /// Request child termination. Returns `false` if the process is gone.
    pub fn shutdown(&self) -> bool {
        self.command_tx.try_send(PtyCommand::Shutdown).is_ok()
    }

    /// Check if the child is still running.
    pub fn is_running(&self) -> bool {
        !self.has_exited.load(Ordering::Relaxed)
    }
}

// ============================================================================
// PtyEventStream - For receiving events from the PTY
// ============================================================================

/// PTY event stream. Single consumer; move it to a dedicated task.
pub struct PtyEventStream {
    event_rx: mpsc::Receiver<PtyEvent>,
}

impl PtyEventStream {
    /// Receive the next event from the PTY.
    pub async fn recv(&mut self) -> Option<PtyEvent> {
        self.event_rx.recv().await
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<PtyEvent> {
        self.event_rx.try_recv().ok()
    }
}

// ============================================================================
// Spawn function - Creates all components
// ============================================================================

/// Result of spawning a PTY process.
pub struct SpawnedPty {
    /// Static information about the process
    pub info: PtyInfo,
    /// Writer for sending data to the PTY
    pub writer: PtyWriter,
    /// Event stream (move this to a dedicated task)
    pub events: PtyEventStream,
    /// Controller for resize and shutdown
    pub controller: PtyController,
}

/// Spawn a child process in a new PTY and return independent components.
///
/// Must be called from within a tokio runtime: the command-processing task
/// is spawned onto it. Spawn failures (PTY allocation, fork, missing
/// executable) surface synchronously as `SupervisorError::SpawnFailed`.
pub fn spawn_pty(id: u32, spec: &PtySpawnSpec) -> SupervisorResult<SpawnedPty> {
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(PtySize {
            rows: spec.rows.max(1),
            cols: spec.cols.max(1),
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SupervisorError::SpawnFailed(format!("Failed to open PTY: {e}")))?;

    let mut cmd = CommandBuilder::new(&spec.executable);
    for arg in &spec.args {
        cmd.arg(arg);
    }
    cmd.cwd(&spec.cwd);
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    let mut child = pair.slave.spawn_command(cmd).map_err(|e| {
        SupervisorError::SpawnFailed(format!("Failed to spawn '{}': {e}", spec.executable))
    })?;

    let pid = child.process_id().unwrap_or(0);
    let mut killer: Box<dyn ChildKiller + Send + Sync> = child.clone_killer();

    // Drop our copy of the slave; the child keeps its own. Without this the
    // reader would never see EOF.
    let master = pair.master;
    drop(pair.slave);

    let (command_tx, mut command_rx) = mpsc::channel::<PtyCommand>(256);
    let (event_tx, event_rx) = mpsc::channel::<PtyEvent>(1024);
    let has_exited = Arc::new(AtomicBool::new(false));

    let mut reader = master
        .try_clone_reader()
        .map_err(|e| SupervisorError::Pty(format!("Failed to clone reader: {e}")))?;
    let mut writer = master
        .take_writer()
        .map_err(|e| SupervisorError::Pty(format!("Failed to take writer: {e}")))?;

    // Reader thread: drains the master until EOF. blocking_send keeps the
    // stream lossless; if the channel backs up the reader waits.
    let data_tx = event_tx.clone();
    let reader_handle = thread::Builder::new()
        .name(format!("pty-reader-{id}"))
        .spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break, // EOF - child side closed
                    Ok(n) => {
                        if data_tx.blocking_send(PtyEvent::Data(buf[..n].to_vec())).is_err() {
                            break; // receiver gone
                        }
                    }
                    Err(e) => {
                        if e.kind() == std::io::ErrorKind::Interrupted
                            || e.kind() == std::io::ErrorKind::WouldBlock
                        {
                            continue;
                        }
                        debug!("PTY reader {id}: read error: {e}");
                        break;
                    }
                }
            }
            debug!("PTY reader {id} exited");
        })
        .map_err(|e| SupervisorError::SpawnFailed(format!("Failed to spawn reader thread: {e}")))?;

    // Waiter thread: observes child exit. Joining the reader first orders
    // the Exit event after the last Data event.
    let exit_tx = event_tx;
    let has_exited_wait = has_exited.clone();
    thread::Builder::new()
        .name(format!("pty-wait-{id}"))
        .spawn(move || {
            let exit_code = match child.wait() {
                Ok(status) => status.exit_code() as i32,
                Err(e) => {
                    warn!("PTY {id}: wait failed: {e}");
                    -1
                }
            };
            let _ = reader_handle.join();
            has_exited_wait.store(true, Ordering::Relaxed);
            if exit_tx.blocking_send(PtyEvent::Exit { exit_code }).is_err() {
                debug!("PTY {id}: exit event dropped, receiver gone");
            }
        })
        .map_err(|e| SupervisorError::SpawnFailed(format!("Failed to spawn wait thread: {e}")))?;

    // Command task: owns the writer and master, applies control operations.
    // It ends when all senders are dropped or on Shutdown; dropping the
    // writer and master closes the PTY and EOFs the reader.
    tokio::spawn(async move {
        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                PtyCommand::Write(data) => {
                    if let Err(e) = writer.write_all(&data).and_then(|_| writer.flush()) {
                        warn!("PTY {id}: write failed: {e}");
                    }
                }
                PtyCommand::Resize { cols, rows } => {
                    // Clamp to at least 1 to avoid native layer errors
                    let size = PtySize {
                        rows: rows.max(1),
                        cols: cols.max(1),
                        pixel_width: 0,
                        pixel_height: 0,
                    };
                    if let Err(e) = master.resize(size) {
                        warn!("PTY {id}: resize failed: {e}");
                    }
                }
                PtyCommand::Shutdown => {
                    if let Err(e) = killer.kill() {
                        debug!("PTY {id}: kill failed (already exited?): {e}");
                    }
                    break;
                }
            }
        }
        debug!("PTY command task {id} exited");
    });

    let info = PtyInfo {
        id,
        pid,
        cwd: spec.cwd.clone(),
    };

    let pty_writer = PtyWriter {
        command_tx: command_tx.clone(),
    };

    let controller = PtyController {
        command_tx,
        has_exited,
    };

    let events = PtyEventStream { event_rx };

    Ok(SpawnedPty {
        info,
        writer: pty_writer,
        events,
        controller,
    })
}

/// Build PTY components backed by bare channels, with no child process.
///
/// The command receiver observes everything a real PTY would execute and the
/// event sender plays the role of the reader/waiter threads.
#[cfg(test)]
pub(crate) fn channel_pty(
    id: u32,
    pid: u32,
    cwd: &str,
) -> (
    SpawnedPty,
    mpsc::Receiver<PtyCommand>,
    mpsc::Sender<PtyEvent>,
) {
    let (command_tx, command_rx) = mpsc::channel(256);
    let (event_tx, event_rx) = mpsc::channel(1024);

    let spawned = SpawnedPty {
        info: PtyInfo {
            id,
            pid,
            cwd: cwd.to_string(),
        },
        writer: PtyWriter {
            command_tx: command_tx.clone(),
        },
        controller: PtyController {
            command_tx,
            has_exited: Arc::new(AtomicBool::new(false)),
        },
        events: PtyEventStream { event_rx },
    };

    (spawned, command_rx, event_tx)
}
