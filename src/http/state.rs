use crate::capture::CaptureConfig;
use crate::catalog::FileCatalog;
use crate::session::{RecordingSession, SessionConfig};
use crate::store::{FsObjectStore, ObjectStore};
use crate::upload::UploadCoordinator;
use crate::session::SessionState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How long sessions stay in memory without activity
#[derive(Debug, Clone, Copy)]
pub struct SessionRetention {
    /// Succeeded or Failed sessions (and their local clip) are dropped after this
    pub finished: Duration,

    /// Recording sessions that received nothing for this long are abandoned
    pub idle: Duration,
}

impl Default for SessionRetention {
    fn default() -> Self {
        Self {
            finished: Duration::from_secs(3600),
            idle: Duration::from_secs(600),
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Capture sessions driven over HTTP (session_id → session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<Mutex<RecordingSession>>>>>,

    /// Process-wide catalog of stored recordings
    pub catalog: Arc<FileCatalog>,

    /// Shared by every session
    pub uploader: UploadCoordinator,

    /// Template for new sessions
    pub session_config: SessionConfig,

    pub capture_config: CaptureConfig,

    pub retention: SessionRetention,

    /// Filesystem store whose signed URLs this server answers
    pub signed_objects: Option<Arc<FsObjectStore>>,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, session_config: SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            catalog: Arc::new(FileCatalog::new(Arc::clone(&store))),
            uploader: UploadCoordinator::new(store),
            session_config,
            capture_config: CaptureConfig::default(),
            retention: SessionRetention::default(),
            signed_objects: None,
        }
    }

    /// State backed by a filesystem store, also serving its signed URLs
    pub fn with_fs_store(store: Arc<FsObjectStore>, session_config: SessionConfig) -> Self {
        let mut state = Self::new(store.clone(), session_config);
        state.signed_objects = Some(store);
        state
    }
}

impl AppState {
    /// Drop finished sessions past retention and abandoned recordings
    ///
    /// Sessions busy with a request are skipped and looked at on the next
    /// sweep. Dropping a session aborts its tick task and releases its device.
    pub async fn evict_expired_sessions(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let retention = self.retention;

        sessions.retain(|session_id, session| {
            let Ok(session) = session.try_lock() else {
                return true;
            };
            let state = session.state();
            let limit = match state {
                SessionState::Succeeded | SessionState::Failed => retention.finished,
                SessionState::Idle | SessionState::Recording => retention.idle,
                SessionState::Finalizing | SessionState::Uploading => return true,
            };
            if session.idle_for() < limit {
                return true;
            }

            info!(
                "Evicting session {} ({}, idle {:?})",
                session_id,
                state,
                session.idle_for()
            );
            false
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("{} sessions remain after eviction", sessions.len());
        }
        evicted
    }

    /// Sweep sessions every `period` until the returned task is aborted
    pub fn spawn_session_reaper(&self, period: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                state.evict_expired_sessions().await;
            }
        })
    }
}
