use crate::capture::CONTENT_TYPE_WEBM;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-5f0c...")
    pub session_id: String,

    /// Key namespace recordings are stored under
    pub namespace: String,

    /// Content type of the finalized blob
    pub content_type: String,

    /// Elapsed-time tick period
    /// Default: 1 second
    pub tick_interval: Duration,

    /// How long `stop()` waits for the device's final fragments
    pub stop_timeout: Duration,
}

impl SessionConfig {
    /// Same settings under a fresh session id
    pub fn renewed(&self) -> Self {
        Self {
            session_id: new_session_id(),
            ..self.clone()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: new_session_id(),
            namespace: "public".to_string(),
            content_type: CONTENT_TYPE_WEBM.to_string(),
            tick_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

fn new_session_id() -> String {
    format!("session-{}", uuid::Uuid::new_v4())
}
