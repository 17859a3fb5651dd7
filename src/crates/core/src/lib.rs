//! Termdock Core - Terminal session supervision
//!
//! This crate provides the process-management core of a desktop terminal
//! emulator: a supervisor owning pseudoterminal child processes, a pure
//! tab-state reducer mirroring those processes in UI-visible state, and a
//! frame-batched bridge delivering output bytes into the emulator.
//!
//! # Architecture
//!
//! The crate is organized into several sub-modules:
//! - `pty`: low-level PTY process spawning and I/O components
//! - `supervisor`: the session registry and event fan-out
//! - `tabs`: immutable tab-state values and the reducer over them
//! - `bridge`: frame-batched output delivery into the emulator
//! - `config`: configuration types and defaults
//! - `events`: supervisor event definitions and subscriber dispatch
//! - `api`: request/response types and the facade for external consumers

pub mod api;
pub mod bridge;
pub mod config;
pub mod events;
pub mod pty;
pub mod supervisor;
pub mod tabs;

// Re-export main types for convenience
pub use api::{
    InterruptRequest, KillRequest, ResizeRequest, SpawnProcessRequest, SpawnTerminalTabRequest,
    SupervisorApi, WriteRequest,
};
pub use bridge::{EmulatorSink, FrameScheduler, OutputBridge, TokioFrameScheduler};
pub use config::{BridgeConfig, SupervisorConfig};
pub use events::{EventDispatcher, SubscriptionId, SupervisorEvent};
pub use pty::{
    spawn_pty, PtyCommand, PtyController, PtyEvent, PtyEventStream, PtyInfo, PtySpawnSpec,
    PtyWriter, SpawnedPty,
};
pub use supervisor::{
    EventStream, ProcessSpec, SessionKind, SessionView, SpawnResponse, Supervisor, TerminalTabSpec,
};
pub use tabs::{
    ClosedTabSnapshot, CreatedTab, ReopenedTab, Session, TabIdMinter, TabKind, TerminalTab,
    UnifiedTabRef,
};

/// Result type for supervisor operations
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Error types for supervisor operations
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("PTY error: {0}")]
    Pty(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
