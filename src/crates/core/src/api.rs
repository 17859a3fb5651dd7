//! API module - Public interface for supervisor operations
//!
//! This module provides the public API for external consumers (desktop IPC,
//! WebSocket, tests). It defines request/response types and a facade that
//! pumps supervisor events into a platform `EventEmitter`.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::StreamExt;
use log::warn;
use serde::{Deserialize, Serialize};

use termdock_events::EventEmitter;

use crate::events::SupervisorEvent;
use crate::supervisor::{
    ProcessSpec, SessionView, SpawnResponse, Supervisor, TerminalTabSpec,
};

// ============================================================================
// Request types
// ============================================================================

/// Request to spawn a terminal tab session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnTerminalTabRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub cwd: String,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(rename = "shellArgs", default)]
    pub shell_args: Vec<String>,
    #[serde(rename = "shellEnv", default)]
    pub shell_env: HashMap<String, String>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,
}

impl From<SpawnTerminalTabRequest> for TerminalTabSpec {
    fn from(request: SpawnTerminalTabRequest) -> Self {
        Self {
            session_id: request.session_id,
            cwd: request.cwd,
            shell: request.shell,
            shell_args: request.shell_args,
            shell_env: request.shell_env,
            cols: request.cols,
            rows: request.rows,
        }
    }
}

/// Request to spawn a generic child process through the session machinery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnProcessRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "toolType")]
    pub tool_type: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cols: Option<u16>,
    #[serde(default)]
    pub rows: Option<u16>,
}

impl From<SpawnProcessRequest> for ProcessSpec {
    fn from(request: SpawnProcessRequest) -> Self {
        Self {
            session_id: request.session_id,
            tool_type: request.tool_type,
            command: request.command,
            args: request.args,
            cwd: request.cwd,
            env: request.env,
            cols: request.cols,
            rows: request.rows,
        }
    }
}

/// Request to write data to a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Raw input; keystrokes including control sequences like `\r`
    pub data: String,
}

/// Request to resize a session's grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub cols: u16,
    pub rows: u16,
}

/// Request to interrupt the foreground program (Ctrl+C)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterruptRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Request to kill a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

// ============================================================================
// Supervisor API facade
// ============================================================================

/// Facade over the supervisor for external consumers.
pub struct SupervisorApi {
    supervisor: Supervisor,
}

impl SupervisorApi {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    /// The underlying supervisor.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Spawn a terminal tab. The error path is in-band: `{success: false,
    /// pid: -1, error}`.
    pub fn spawn_terminal_tab(&self, request: SpawnTerminalTabRequest) -> SpawnResponse {
        self.supervisor.spawn_terminal_tab(request.into())
    }

    /// Spawn a generic child process.
    pub fn spawn_process(&self, request: SpawnProcessRequest) -> SpawnResponse {
        self.supervisor.spawn(request.into())
    }

    /// Write keystrokes to a session. `false` means the session is unknown
    /// (already closed) and the input was dropped.
    pub fn write(&self, request: WriteRequest) -> bool {
        self.supervisor
            .write(&request.session_id, request.data.as_bytes())
    }

    /// Resize a session's grid.
    pub fn resize(&self, request: ResizeRequest) -> bool {
        self.supervisor
            .resize(&request.session_id, request.cols, request.rows)
    }

    /// Send Ctrl+C to a session.
    pub fn interrupt(&self, request: InterruptRequest) -> bool {
        self.supervisor.interrupt(&request.session_id)
    }

    /// Kill a session.
    pub fn kill(&self, request: KillRequest) -> bool {
        self.supervisor.kill(&request.session_id)
    }

    /// Kill every session. Returns the number killed.
    pub fn kill_all(&self) -> usize {
        self.supervisor.kill_all()
    }

    /// Snapshot of one session.
    pub fn get(&self, session_id: &str) -> Option<SessionView> {
        self.supervisor.get(session_id)
    }

    /// Snapshot of all sessions.
    pub fn get_all(&self) -> Vec<SessionView> {
        self.supervisor.get_all()
    }

    /// Pump supervisor events into a platform emitter.
    ///
    /// Byte payloads are base64 encoded so they survive JSON transport
    /// intact. The task runs until the supervisor is dropped.
    pub fn forward_events(&self, emitter: Arc<dyn EventEmitter>) -> tokio::task::JoinHandle<()> {
        let mut stream = self.supervisor.event_stream();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let result = match &event {
                    SupervisorEvent::RawPtyData { session_id, bytes } => {
                        emitter
                            .emit_terminal_output(session_id, &BASE64.encode(bytes))
                            .await
                    }
                    SupervisorEvent::AgentData { session_id, bytes } => {
                        emitter
                            .emit_agent_output(session_id, &BASE64.encode(bytes))
                            .await
                    }
                    SupervisorEvent::Exit {
                        session_id,
                        exit_code,
                    } => emitter.emit_session_exit(session_id, *exit_code).await,
                };
                if let Err(e) = result {
                    warn!("Failed to emit {}: {e}", event.session_id());
                }
            }
        })
    }
}
