//! Capture devices that feed a recording session
//!
//! A device turns hardware (or a replayed file, or a browser pushing data)
//! into an ordered stream of [`CaptureEvent`]s. Opening the device is the
//! permission request; closing it asks for the final `Stopped` notification.

pub mod backend;
pub mod file;
pub mod push;

pub use backend::{CaptureConfig, CaptureDevice, CaptureDeviceFactory, CaptureEvent, CaptureSource};
pub use file::FileCapture;
pub use push::PushCapture;

/// The only container format the capture facility produces
pub const CONTENT_TYPE_WEBM: &str = "audio/webm";
