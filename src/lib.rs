pub mod capture;
pub mod catalog;
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod keys;
pub mod session;
pub mod store;
pub mod upload;

pub use capture::{
    CaptureConfig, CaptureDevice, CaptureDeviceFactory, CaptureEvent, CaptureSource, FileCapture,
    PushCapture, CONTENT_TYPE_WEBM,
};
pub use catalog::{AllOrNothingResolver, CatalogEntry, CatalogStats, FileCatalog, UrlResolver};
pub use config::Config;
pub use error::{DeleteError, ListError, PermissionError, SessionError, StoreError, UploadError};
pub use format::{format_elapsed, format_file_size};
pub use http::{create_router, AppState, SessionRetention};
pub use keys::{display_id, recording_key, RecordingKey};
pub use session::{RecordingSession, SessionConfig, SessionState, SessionStatus, StopOutcome};
pub use store::{FsObjectStore, ObjectStore, SignedUrlConfig, StoredObject};
pub use upload::UploadCoordinator;
