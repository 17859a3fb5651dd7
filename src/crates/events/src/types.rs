/// Event type definitions
///
/// Cross-platform event names and payload shapes for the terminal core.
use serde::{Deserialize, Serialize};

/// Event name for raw terminal-tab output bytes.
pub const RAW_PTY_DATA: &str = "raw-pty-data";

/// Event name for agent-process output bytes (separate stream from tabs).
pub const AGENT_DATA: &str = "agent-data";

/// Event name for session exit.
pub const EXIT: &str = "exit";

/// Payload for byte-stream events.
///
/// `data` is base64-encoded: PTY output is arbitrary bytes (including split
/// UTF-8 sequences and escape codes) and must survive JSON transport intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub data: String,
}

/// Payload for session exit events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitPayload {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
}
