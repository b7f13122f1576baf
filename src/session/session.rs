use super::config::SessionConfig;
use super::state::{SessionState, SessionStatus};
use crate::capture::{CaptureDevice, CaptureEvent};
use crate::error::SessionError;
use crate::format::format_elapsed;
use crate::keys;
use crate::store::StoredObject;
use crate::upload::UploadCoordinator;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of a `stop()` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The recording was finalized and persisted
    Stored(StoredObject),
    /// The session was not recording; nothing happened
    Ignored(SessionState),
}

/// One capture interaction, from idle through a persisted (or failed) blob
///
/// The capture device, event queue and tick task are owned here: created by
/// `start()` and torn down when the session stops.
pub struct RecordingSession {
    /// Session configuration
    config: SessionConfig,

    /// Persists the finalized blob
    uploader: UploadCoordinator,

    state: SessionState,

    /// Fragments in arrival order; taken when the blob is built
    chunks: Vec<Vec<u8>>,

    /// Number of fragments received
    fragments_received: usize,

    /// Total bytes received
    bytes_received: usize,

    /// Whole seconds recorded, bumped by the tick task
    elapsed_secs: Arc<AtomicU64>,

    /// Handle for the elapsed-time tick task
    ticker: Option<JoinHandle<()>>,

    /// Device feeding this session while recording
    device: Option<Box<dyn CaptureDevice>>,

    /// Event queue of the open device
    events: Option<mpsc::Receiver<CaptureEvent>>,

    /// Set once the device delivered `Stopped`
    device_stopped: bool,

    /// Epoch milliseconds at stop
    stopped_at_ms: Option<i64>,

    key: Option<String>,

    /// Built once, at finalization
    final_blob: Option<Vec<u8>>,

    stored: Option<StoredObject>,

    last_error: Option<String>,

    /// Last fragment or state change
    last_activity: Instant,
}

impl RecordingSession {
    pub fn new(config: SessionConfig, uploader: UploadCoordinator) -> Self {
        debug!("Creating recording session: {}", config.session_id);

        Self {
            config,
            uploader,
            state: SessionState::Idle,
            chunks: Vec::new(),
            fragments_received: 0,
            bytes_received: 0,
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            ticker: None,
            device: None,
            events: None,
            device_stopped: false,
            stopped_at_ms: None,
            key: None,
            final_blob: None,
            stored: None,
            last_error: None,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs.load(Ordering::SeqCst)
    }

    /// Key generated at stop time
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Descriptor of the persisted object, once Succeeded
    pub fn stored(&self) -> Option<&StoredObject> {
        self.stored.as_ref()
    }

    /// The finalized recording, kept locally whatever the upload outcome
    pub fn final_blob(&self) -> Option<&[u8]> {
        self.final_blob.as_deref()
    }

    /// Start recording
    ///
    /// Opening the device is the permission request. On refusal the session
    /// stays Idle and the error is returned to the caller.
    pub async fn start(&mut self, mut device: Box<dyn CaptureDevice>) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            warn!(
                "Session {} cannot start from state {}",
                self.config.session_id, self.state
            );
            return Err(SessionError::InvalidTransition {
                operation: "start",
                state: self.state,
            });
        }

        info!(
            "Starting recording session {} on {} device",
            self.config.session_id,
            device.name()
        );

        let events = match device.open().await {
            Ok(events) => events,
            Err(e) => {
                warn!("Capture permission refused for {}: {}", self.config.session_id, e);
                return Err(e.into());
            }
        };

        self.chunks.clear();
        self.fragments_received = 0;
        self.bytes_received = 0;
        self.elapsed_secs.store(0, Ordering::SeqCst);
        self.device_stopped = false;
        self.device = Some(device);
        self.events = Some(events);
        self.state = SessionState::Recording;
        self.touch();
        self.start_ticker();

        info!("Recording session {} started", self.config.session_id);

        Ok(())
    }

    /// Append one fragment; only valid while Recording
    pub fn on_chunk(&mut self, fragment: Vec<u8>) -> Result<(), SessionError> {
        if self.state != SessionState::Recording {
            warn!(
                "Dropping fragment for session {} in state {}",
                self.config.session_id, self.state
            );
            return Err(SessionError::InvalidTransition {
                operation: "append a fragment",
                state: self.state,
            });
        }

        self.append(fragment);
        Ok(())
    }

    /// Apply the next event from the capture device
    ///
    /// Returns `true` while the stream is live and `false` once the device
    /// has stopped (or went away). Finalization is left to [`Self::stop`], so
    /// dropping this future never interrupts an upload.
    pub async fn process_next_event(&mut self) -> bool {
        if self.state != SessionState::Recording || self.device_stopped {
            return false;
        }

        let event = match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => return false,
        };

        match event {
            Some(CaptureEvent::Fragment(fragment)) => {
                self.append(fragment);
                true
            }
            Some(CaptureEvent::Stopped) | None => {
                info!(
                    "Capture device stopped for session {}",
                    self.config.session_id
                );
                self.device_stopped = true;
                false
            }
        }
    }

    /// True once the device delivered its final event
    pub fn device_stopped(&self) -> bool {
        self.device_stopped
    }

    /// Stop recording, finalize the blob and upload it
    ///
    /// Calling this when the session is Idle or terminal is a no-op reported
    /// as [`StopOutcome::Ignored`]. A stop that was interrupted while
    /// Finalizing or Uploading is resumed under the same key.
    pub async fn stop(&mut self) -> Result<StopOutcome, SessionError> {
        // Tick cancellation is safe whether or not a tick is running
        self.stop_ticker();

        match self.state {
            SessionState::Recording => {
                info!("Stopping recording session: {}", self.config.session_id);
                self.state = SessionState::Finalizing;
                self.stopped_at_ms = Some(Utc::now().timestamp_millis());
                self.touch();
                self.drain_device().await;
                self.finalize();
            }
            SessionState::Finalizing => {
                warn!(
                    "Resuming interrupted finalization of session {}",
                    self.config.session_id
                );
                self.drain_device().await;
                self.finalize();
            }
            SessionState::Uploading => {
                warn!(
                    "Resuming interrupted upload of session {}",
                    self.config.session_id
                );
            }
            state => {
                warn!(
                    "Recording not active for session {} (state {})",
                    self.config.session_id, state
                );
                return Ok(StopOutcome::Ignored(state));
            }
        }

        self.upload().await
    }

    /// Build the blob and key; Finalizing -> Uploading
    fn finalize(&mut self) {
        let stopped_at_ms = *self
            .stopped_at_ms
            .get_or_insert_with(|| Utc::now().timestamp_millis());
        let key = keys::recording_key(&self.config.namespace, stopped_at_ms);
        let blob = std::mem::take(&mut self.chunks).concat();

        info!(
            "Finalized session {}: {} fragments, {} bytes, {}s",
            self.config.session_id,
            self.fragments_received,
            blob.len(),
            self.elapsed_secs()
        );

        self.key = Some(key);
        self.final_blob = Some(blob);
        self.state = SessionState::Uploading;
    }

    async fn upload(&mut self) -> Result<StopOutcome, SessionError> {
        let (Some(key), Some(blob)) = (self.key.clone(), self.final_blob.clone()) else {
            return Ok(StopOutcome::Ignored(self.state));
        };

        let uploaded = self
            .uploader
            .upload(&key, blob, &self.config.content_type)
            .await;
        self.touch();

        match uploaded {
            Ok(stored) => {
                self.state = SessionState::Succeeded;
                self.stored = Some(stored.clone());
                info!("Recording session {} succeeded", self.config.session_id);
                Ok(StopOutcome::Stored(stored))
            }
            Err(e) => {
                self.state = SessionState::Failed;
                self.last_error = Some(e.to_string());
                error!(
                    "Recording session {} failed; clip kept locally",
                    self.config.session_id
                );
                Err(e.into())
            }
        }
    }

    /// Time since the last fragment or state change
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// File name for a local download of the clip, once finalized
    pub fn local_file_name(&self) -> Option<String> {
        self.stopped_at_ms.map(keys::local_file_name)
    }

    /// Get current session status
    pub fn status(&self) -> SessionStatus {
        let elapsed_secs = self.elapsed_secs();

        SessionStatus {
            session_id: self.config.session_id.clone(),
            state: self.state,
            elapsed_secs,
            elapsed_display: format_elapsed(elapsed_secs),
            fragments: self.fragments_received,
            bytes: self.bytes_received,
            key: self.key.clone(),
            stored: self.stored.clone(),
            error: self.last_error.clone(),
        }
    }

    /// Write the finalized clip into `dir` as `recording-<epochMillis>.webm`
    pub async fn save_local(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let (Some(blob), Some(stopped_at_ms)) = (&self.final_blob, self.stopped_at_ms) else {
            bail!(
                "Session {} has no finalized recording (state {})",
                self.config.session_id,
                self.state
            );
        };

        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(keys::local_file_name(stopped_at_ms));
        tokio::fs::write(&path, blob)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved local copy to {}", path.display());

        Ok(path)
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn append(&mut self, fragment: Vec<u8>) {
        self.touch();
        self.fragments_received += 1;
        self.bytes_received += fragment.len();
        self.chunks.push(fragment);
    }

    /// Close the device and collect fragments it still had buffered
    async fn drain_device(&mut self) {
        let device = self.device.take();
        let events = self.events.take().filter(|_| !self.device_stopped);
        let deadline = Instant::now() + self.config.stop_timeout;
        let session_id = self.config.session_id.as_str();

        // Close and drain concurrently: a device may block on a full queue
        // until its remaining fragments are consumed.
        let close = async move {
            if let Some(mut device) = device {
                if let Err(e) = device.close().await {
                    warn!("Failed to close {} device: {}", device.name(), e);
                }
            }
        };
        let drain = async move {
            let mut remaining = Vec::new();
            let Some(mut events) = events else {
                return remaining;
            };
            loop {
                match tokio::time::timeout_at(deadline, events.recv()).await {
                    Ok(Some(CaptureEvent::Fragment(fragment))) => remaining.push(fragment),
                    Ok(Some(CaptureEvent::Stopped)) | Ok(None) => break,
                    Err(_) => {
                        warn!(
                            "Capture device for session {} did not confirm stop in time",
                            session_id
                        );
                        break;
                    }
                }
            }
            remaining
        };

        let ((), remaining) = tokio::join!(close, drain);
        for fragment in remaining {
            self.append(fragment);
        }
        self.device_stopped = true;
    }

    fn start_ticker(&mut self) {
        self.stop_ticker();

        let elapsed_secs = Arc::clone(&self.elapsed_secs);
        let period = self.config.tick_interval;

        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                elapsed_secs.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
