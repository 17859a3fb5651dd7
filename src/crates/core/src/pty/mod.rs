//! PTY module - Process spawning and data handling
//!
//! This module provides the low-level PTY functionality:
//! - Process spawning and lifecycle management
//! - Lossless output forwarding from a dedicated reader thread
//! - Exit observation ordered after the last data event
//!
//! ## Architecture
//!
//! Spawning returns independent components:
//!
//! - **PtyWriter**: for writing data to the PTY (can be cloned and shared)
//! - **PtyEventStream**: for receiving events (move to a dedicated task)
//! - **PtyController**: for control operations (resize, shutdown)
//!
//! All control flows through a command channel, so no component holds a lock
//! during normal operation and every operation on a dead process degrades to
//! a silent no-op.

mod process;

pub use process::{
    spawn_pty, PtyCommand, PtyController, PtyEvent, PtyEventStream, PtyInfo, PtySpawnSpec,
    PtyWriter, SpawnedPty,
};

#[cfg(test)]
pub(crate) use process::channel_pty;
