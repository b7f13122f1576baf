use crate::error::PermissionError;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Notification delivered by a capture device, in temporal order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A piece of the encoded audio stream
    Fragment(Vec<u8>),
    /// Capture ended; no fragment follows this event
    Stopped,
}

/// Configuration for capture devices
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Bytes per fragment when replaying a file
    pub fragment_bytes: usize,
    /// Delay between fragments when replaying a file
    pub fragment_interval: Duration,
    /// Event channel capacity
    pub channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fragment_bytes: 16 * 1024,
            fragment_interval: Duration::from_millis(250),
            channel_capacity: 100,
        }
    }
}

/// Capture device trait
///
/// Implementations:
/// - [`PushCapture`](super::PushCapture): fragments pushed by an external producer (browser upload)
/// - [`FileCapture`](super::FileCapture): replays an existing `.webm` file
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request access and start capturing
    ///
    /// Returns a channel receiver that will receive capture events
    async fn open(&mut self) -> Result<mpsc::Receiver<CaptureEvent>, PermissionError>;

    /// Ask the device to stop
    ///
    /// The device delivers any buffered fragments and then `Stopped`.
    async fn close(&mut self) -> anyhow::Result<()>;

    /// Check if device is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Fragments arrive from outside the process
    Push,
    /// Replay a recorded file
    File(PathBuf),
}

/// Capture device factory
pub struct CaptureDeviceFactory;

impl CaptureDeviceFactory {
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Box<dyn CaptureDevice> {
        match source {
            CaptureSource::Push => Box::new(super::PushCapture::new(config.channel_capacity)),
            CaptureSource::File(path) => Box::new(super::FileCapture::new(path, config)),
        }
    }
}
