use crate::store::StoredObject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one capture interaction
///
/// ```text
/// Idle --start--> Recording --stop--> Finalizing --> Uploading --> Succeeded
///                                                          \-----> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    Finalizing,
    Uploading,
    Succeeded,
    Failed,
}

impl SessionState {
    /// Succeeded and Failed accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Failed)
    }

    /// True once the blob has been (or is being) built
    pub fn is_finalized(self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Recording)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Recording => "recording",
            SessionState::Finalizing => "finalizing",
            SessionState::Uploading => "uploading",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,

    pub state: SessionState,

    /// Whole seconds spent recording
    pub elapsed_secs: u64,

    /// Elapsed time as shown by the recorder (mm:ss)
    pub elapsed_display: String,

    /// Number of fragments received
    pub fragments: usize,

    /// Total bytes received
    pub bytes: usize,

    /// Key the blob was (or is being) uploaded under
    pub key: Option<String>,

    /// Descriptor returned by the store on success
    pub stored: Option<StoredObject>,

    /// Upload failure, if any
    pub error: Option<String>,
}
