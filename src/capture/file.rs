use super::backend::{CaptureConfig, CaptureDevice, CaptureEvent};
use crate::error::PermissionError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Replays a `.webm` file as a paced stream of fragments
///
/// Useful for batch uploads and testing without a microphone. The stream ends
/// with `Stopped` when the device is closed or the file is exhausted.
pub struct FileCapture {
    path: PathBuf,
    config: CaptureConfig,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            stop_tx: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for FileCapture {
    async fn open(&mut self) -> Result<mpsc::Receiver<CaptureEvent>, PermissionError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            PermissionError::DeviceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        info!(
            "Replaying {} ({} bytes) as capture input",
            self.path.display(),
            data.len()
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let fragment_bytes = self.config.fragment_bytes.max(1);
        let period = self.config.fragment_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut fragments = data.chunks(fragment_bytes);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                }

                match fragments.next() {
                    Some(fragment) => {
                        if tx.send(CaptureEvent::Fragment(fragment.to_vec())).await.is_err() {
                            return;
                        }
                    }
                    None => break,
                }
            }

            if tx.send(CaptureEvent::Stopped).await.is_err() {
                warn!("File capture receiver dropped before stop");
            }
        });

        self.stop_tx = Some(stop_tx);
        self.task = Some(task);

        Ok(rx)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        // The replay task emits `Stopped` itself; waiting for it here could
        // block on a full channel nobody drains yet.
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        self.task = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}
