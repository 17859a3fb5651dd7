//! Output bridge - frame-batched delivery of PTY bytes into the emulator
//!
//! One bridge binds one mounted session to one emulator surface. Bytes from
//! the supervisor's `raw-pty-data` stream are coalesced and written to the
//! emulator once per display frame instead of once per PTY chunk, so bursty
//! output does not turn into thousands of tiny emulator writes. Crossing the
//! force-flush threshold bypasses the frame wait; unmounting flushes
//! synchronously, so no byte produced before teardown is ever dropped.
//! Coalescing never reorders bytes for a session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::config::BridgeConfig;
use crate::events::{SubscriptionId, SupervisorEvent};
use crate::supervisor::Supervisor;

/// The opaque emulator boundary: the terminal widget the bridge writes into.
pub trait EmulatorSink: Send + Sync {
    /// Push raw bytes into the emulator's parser.
    fn write(&self, bytes: &[u8]);

    /// Resize the emulator grid.
    fn resize(&self, cols: u16, rows: u16);
}

/// Scheduling of the once-per-frame flush. Injectable so headless tests can
/// drive ticks manually instead of depending on wall-clock frames.
pub trait FrameScheduler: Send + Sync {
    /// Arrange for `tick` to run one display frame from now.
    fn schedule(&self, tick: Box<dyn FnOnce() + Send>);
}

/// Production scheduler: one display frame (~16 ms) on the tokio timer.
pub struct TokioFrameScheduler {
    frame_interval: Duration,
}

impl TokioFrameScheduler {
    pub fn new(frame_interval_ms: u64) -> Self {
        Self {
            frame_interval: Duration::from_millis(frame_interval_ms),
        }
    }
}

impl FrameScheduler for TokioFrameScheduler {
    fn schedule(&self, tick: Box<dyn FnOnce() + Send>) {
        let delay = self.frame_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tick();
        });
    }
}

struct BridgeState {
    buffer: Vec<u8>,
    flush_scheduled: bool,
    /// Bumped by every flush; a pending tick carrying an older generation
    /// is cancelled and does nothing.
    generation: u64,
    /// Set once the mounted session exited; the next keystroke requests a
    /// tab close instead of reaching the dead PTY.
    exited: bool,
}

struct BridgeCore {
    session_id: String,
    config: BridgeConfig,
    sink: Arc<dyn EmulatorSink>,
    scheduler: Arc<dyn FrameScheduler>,
    supervisor: Supervisor,
    state: Mutex<BridgeState>,
    on_close_request: Box<dyn Fn() + Send + Sync>,
    resize_generation: AtomicU64,
}

impl BridgeCore {
    fn lock_state(&self) -> MutexGuard<'_, BridgeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn on_data(core: &Arc<Self>, bytes: &[u8]) {
        let mut state = core.lock_state();
        state.buffer.extend_from_slice(bytes);

        if state.buffer.len() >= core.config.force_flush_size {
            // Threshold crossed: cancel the pending tick and flush now.
            Self::flush_locked(&core.sink, &mut state);
        } else if !state.flush_scheduled {
            state.flush_scheduled = true;
            let generation = state.generation;
            drop(state);

            let tick_core = core.clone();
            core.scheduler
                .schedule(Box::new(move || tick_core.frame_tick(generation)));
        }
    }

    fn frame_tick(&self, generation: u64) {
        let mut state = self.lock_state();
        if state.generation != generation || !state.flush_scheduled {
            return; // cancelled by a force flush or teardown
        }
        Self::flush_locked(&self.sink, &mut state);
    }

    /// Write the whole buffer to the emulator in one call and invalidate any
    /// in-flight tick.
    fn flush_locked(sink: &Arc<dyn EmulatorSink>, state: &mut BridgeState) {
        state.flush_scheduled = false;
        state.generation += 1;
        if state.buffer.is_empty() {
            return;
        }
        let data = std::mem::take(&mut state.buffer);
        sink.write(&data);
    }

    fn flush_now(&self) {
        let mut state = self.lock_state();
        Self::flush_locked(&self.sink, &mut state);
    }

    fn on_exit(&self, exit_code: i32) {
        let mut state = self.lock_state();
        Self::flush_locked(&self.sink, &mut state);
        state.exited = true;
        drop(state);

        let notice = format!(
            "\r\n\x1b[2m[Process exited with code {exit_code}]\x1b[0m\r\n\
             \x1b[2mPress any key to close this tab.\x1b[0m\r\n"
        );
        self.sink.write(notice.as_bytes());
    }

    fn on_user_input(&self, bytes: &[u8]) {
        let exited = self.lock_state().exited;
        if exited {
            (self.on_close_request)();
            return;
        }
        if !self.supervisor.write(&self.session_id, bytes) {
            debug!(
                "Bridge {}: dropped {} input byte(s), session gone",
                self.session_id,
                bytes.len()
            );
        }
    }

    fn request_resize(core: &Arc<Self>, cols: u16, rows: u16) {
        // Debounce: only the latest request inside the window wins.
        let generation = core.resize_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = Duration::from_millis(core.config.resize_debounce_ms);
        let task_core = core.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_core.resize_generation.load(Ordering::Relaxed) == generation {
                task_core.sink.resize(cols, rows);
                task_core
                    .supervisor
                    .resize(&task_core.session_id, cols, rows);
            }
        });
    }
}

/// Binds one mounted session to one emulator surface.
///
/// Mounting subscribes to the supervisor's event fan-out; `unmount` detaches
/// and flushes, so switching the mounted session is atomic: the outgoing
/// bridge's bytes land before the new session's bridge starts with an empty
/// buffer.
pub struct OutputBridge {
    core: Arc<BridgeCore>,
    subscription: SubscriptionId,
}

impl OutputBridge {
    /// Mount `session_id` onto an emulator sink.
    ///
    /// `on_close_request` is invoked when the user presses a key after the
    /// session's process exited (press-any-key-to-close).
    pub fn mount(
        supervisor: &Supervisor,
        session_id: impl Into<String>,
        sink: Arc<dyn EmulatorSink>,
        scheduler: Arc<dyn FrameScheduler>,
        config: BridgeConfig,
        on_close_request: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        let core = Arc::new(BridgeCore {
            session_id: session_id.into(),
            config,
            sink,
            scheduler,
            supervisor: supervisor.clone(),
            state: Mutex::new(BridgeState {
                buffer: Vec::new(),
                flush_scheduled: false,
                generation: 0,
                exited: false,
            }),
            on_close_request: Box::new(on_close_request),
            resize_generation: AtomicU64::new(0),
        });

        let callback_core = core.clone();
        let subscription = supervisor.on(move |event| match event {
            SupervisorEvent::RawPtyData { session_id, bytes }
                if *session_id == callback_core.session_id =>
            {
                BridgeCore::on_data(&callback_core, bytes);
            }
            SupervisorEvent::Exit {
                session_id,
                exit_code,
            } if *session_id == callback_core.session_id => {
                callback_core.on_exit(*exit_code);
            }
            _ => {}
        });

        Self { core, subscription }
    }

    /// The mounted session id.
    pub fn session_id(&self) -> &str {
        &self.core.session_id
    }

    /// Forward user keystrokes. Routed to the session's PTY stdin, or to the
    /// close-request callback once the process has exited.
    pub fn on_user_input(&self, bytes: &[u8]) {
        self.core.on_user_input(bytes);
    }

    /// Debounced grid resize: forwards the latest dimensions to the emulator
    /// and the supervisor once the container stops changing size.
    pub fn request_resize(&self, cols: u16, rows: u16) {
        BridgeCore::request_resize(&self.core, cols, rows);
    }

    /// Flush any buffered bytes to the emulator immediately.
    pub fn flush(&self) {
        self.core.flush_now();
    }

    /// Detach from the supervisor, cancel any pending frame tick, and flush
    /// buffered bytes synchronously.
    pub fn unmount(self) {
        self.core.supervisor.off(self.subscription);
        self.core.flush_now();
    }
}
