//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Opening the capture device (the microphone permission request)
//! - Collecting fragments in arrival order
//! - The one-per-second elapsed-time tick
//! - Finalizing the blob and handing it to the upload coordinator
//! - Status snapshots for the UI layer

mod config;
mod session;
mod state;

pub use config::SessionConfig;
pub use session::{RecordingSession, StopOutcome};
pub use state::{SessionState, SessionStatus};
