use super::backend::{CaptureDevice, CaptureEvent};
use crate::error::PermissionError;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Device whose fragments are produced outside the process
///
/// The browser owns the microphone, so opening is always granted. Fragments
/// either go through [`sender`](Self::sender) or straight to
/// `RecordingSession::on_chunk`; closing emits `Stopped`.
pub struct PushCapture {
    capacity: usize,
    tx: Option<mpsc::Sender<CaptureEvent>>,
}

impl PushCapture {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tx: None,
        }
    }

    /// Sender for an external producer, available while capturing
    pub fn sender(&self) -> Option<mpsc::Sender<CaptureEvent>> {
        self.tx.clone()
    }
}

#[async_trait::async_trait]
impl CaptureDevice for PushCapture {
    async fn open(&mut self) -> Result<mpsc::Receiver<CaptureEvent>, PermissionError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.tx = Some(tx);
        debug!("Push capture opened");
        Ok(rx)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.tx.take() {
            if tx.send(CaptureEvent::Stopped).await.is_err() {
                warn!("Push capture receiver dropped before stop");
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "push"
    }
}
