//! Configuration type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bytes buffered before the output bridge bypasses the frame wait: 512 KiB.
/// Source chunks are typically 4-16 KiB, so this allows heavy coalescing
/// while bounding latency for bursty producers.
pub const DEFAULT_FORCE_FLUSH_SIZE: usize = 512 * 1024;

/// One display frame at ~60 Hz.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Debounce window for container-driven grid resizes.
pub const DEFAULT_RESIZE_DEBOUNCE_MS: u64 = 100;

/// Main supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Default shell executable; `None` uses the platform default
    pub default_shell: Option<String>,

    /// Environment variables set for all spawned sessions
    pub env: HashMap<String, String>,

    /// Default terminal dimensions
    pub default_cols: u16,
    pub default_rows: u16,

    /// Output bridge configuration
    pub bridge: BridgeConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            default_shell: None,
            env: HashMap::new(),
            default_cols: 80,
            default_rows: 24,
            bridge: BridgeConfig::default(),
        }
    }
}

/// Output bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Buffer size at which the bridge flushes immediately instead of
    /// waiting for the next frame tick
    pub force_flush_size: usize,

    /// Frame interval in milliseconds (flush cadence)
    pub frame_interval_ms: u64,

    /// Debounce window for grid resize requests in milliseconds
    pub resize_debounce_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            force_flush_size: DEFAULT_FORCE_FLUSH_SIZE,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            resize_debounce_ms: DEFAULT_RESIZE_DEBOUNCE_MS,
        }
    }
}

/// Get the default shell executable for the current platform
pub fn default_shell_executable() -> String {
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
    #[cfg(not(windows))]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}

/// Base environment for spawned children. Always contains `PATH`, `TERM`
/// and `HOME`; per-config and per-spawn variables are merged over it.
pub fn base_environment() -> HashMap<String, String> {
    let mut env = HashMap::new();

    let path = std::env::var("PATH").unwrap_or_else(|_| default_path().to_string());
    env.insert("PATH".to_string(), path);
    env.insert("TERM".to_string(), "xterm-256color".to_string());

    #[cfg(windows)]
    let home = std::env::var("USERPROFILE").unwrap_or_else(|_| "C:\\".to_string());
    #[cfg(not(windows))]
    let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
    env.insert("HOME".to_string(), home);

    env
}

fn default_path() -> &'static str {
    #[cfg(windows)]
    {
        "C:\\Windows\\System32"
    }
    #[cfg(not(windows))]
    {
        "/usr/local/bin:/usr/bin:/bin"
    }
}
