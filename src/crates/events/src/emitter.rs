/// EventEmitter Trait
///
/// All event sending interfaces for all platforms, the core layer sends
/// events through this trait without depending on a specific frontend
/// transport (desktop IPC, WebSocket, test harness).
use async_trait::async_trait;
use log::{debug, info};

use crate::types::{self, ExitPayload, OutputPayload};

/// Event emitter trait
///
/// Core services send events through this trait, without directly depending
/// on specific platforms.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Send generic events
    async fn emit(&self, event_name: &str, payload: serde_json::Value) -> anyhow::Result<()>;

    /// Send terminal-tab output bytes (already base64 encoded)
    async fn emit_terminal_output(&self, session_id: &str, data_b64: &str) -> anyhow::Result<()> {
        let payload = OutputPayload {
            session_id: session_id.to_string(),
            data: data_b64.to_string(),
        };
        self.emit(types::RAW_PTY_DATA, serde_json::to_value(payload)?)
            .await
    }

    /// Send agent-process output bytes (already base64 encoded)
    async fn emit_agent_output(&self, session_id: &str, data_b64: &str) -> anyhow::Result<()> {
        let payload = OutputPayload {
            session_id: session_id.to_string(),
            data: data_b64.to_string(),
        };
        self.emit(types::AGENT_DATA, serde_json::to_value(payload)?)
            .await
    }

    /// Send session exit events
    async fn emit_session_exit(&self, session_id: &str, exit_code: i32) -> anyhow::Result<()> {
        let payload = ExitPayload {
            session_id: session_id.to_string(),
            exit_code,
        };
        self.emit(types::EXIT, serde_json::to_value(payload)?).await
    }
}

/// Emitter for supervisors with no frontend attached (headless runs);
/// session events are discarded.
#[derive(Debug, Clone, Copy)]
pub struct NullEmitter;

#[async_trait]
impl EventEmitter for NullEmitter {
    async fn emit(&self, event_name: &str, _payload: serde_json::Value) -> anyhow::Result<()> {
        debug!("Discarding {} event, no frontend attached", event_name);
        Ok(())
    }
}

/// Emitter that writes session events to the log instead of a transport.
/// Useful for tracing supervisor traffic during development.
#[derive(Debug, Clone, Copy)]
pub struct LoggingEmitter;

#[async_trait]
impl EventEmitter for LoggingEmitter {
    async fn emit(&self, event_name: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        info!("Session event {} -> {}", event_name, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_emitter_accepts_all_events() {
        let emitter = NullEmitter;
        assert!(emitter
            .emit("anything", serde_json::json!({"k": 1}))
            .await
            .is_ok());
        assert!(emitter.emit_terminal_output("s1", "aGk=").await.is_ok());
        assert!(emitter.emit_session_exit("s1", 0).await.is_ok());
    }

    #[tokio::test]
    async fn helper_events_use_canonical_names() {
        use std::sync::Mutex;

        struct Capture(Mutex<Vec<(String, serde_json::Value)>>);

        #[async_trait]
        impl EventEmitter for Capture {
            async fn emit(
                &self,
                event_name: &str,
                payload: serde_json::Value,
            ) -> anyhow::Result<()> {
                self.0
                    .lock()
                    .unwrap()
                    .push((event_name.to_string(), payload));
                Ok(())
            }
        }

        let capture = Capture(Mutex::new(Vec::new()));
        capture.emit_terminal_output("s1", "aGk=").await.unwrap();
        capture.emit_agent_output("s2", "eA==").await.unwrap();
        capture.emit_session_exit("s1", 130).await.unwrap();

        let events = capture.0.lock().unwrap();
        assert_eq!(events[0].0, types::RAW_PTY_DATA);
        assert_eq!(events[0].1["sessionId"], "s1");
        assert_eq!(events[0].1["data"], "aGk=");
        assert_eq!(events[1].0, types::AGENT_DATA);
        assert_eq!(events[2].0, types::EXIT);
        assert_eq!(events[2].1["exitCode"], 130);
    }
}
