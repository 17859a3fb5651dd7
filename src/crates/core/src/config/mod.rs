//! Configuration module - Supervisor and bridge configuration

mod types;

pub use types::{
    base_environment, default_shell_executable, BridgeConfig, SupervisorConfig,
    DEFAULT_FORCE_FLUSH_SIZE, DEFAULT_FRAME_INTERVAL_MS, DEFAULT_RESIZE_DEBOUNCE_MS,
};
