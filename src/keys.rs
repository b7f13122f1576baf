//! Object key codec
//!
//! Recordings are persisted under a single canonical key scheme:
//!
//! ```text
//! <namespace>/voice-<epochMillis>.webm
//! ```
//!
//! The same scheme is used for writing keys at stop time and for parsing them
//! back when the catalog is listed. Keys that do not follow it are still shown,
//! using their last path segment without extension as the display id.

use chrono::{TimeZone, Utc};

const KEY_PREFIX: &str = "voice-";
const KEY_EXTENSION: &str = ".webm";

/// Parsed form of a canonical recording key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingKey {
    /// Namespace the key lives under (empty when the key has no directory)
    pub namespace: String,

    /// Epoch milliseconds at which the recording was stopped
    pub timestamp_ms: i64,
}

impl RecordingKey {
    pub fn new(namespace: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            namespace: namespace.into(),
            timestamp_ms,
        }
    }

    /// Parse a key in canonical form, `None` for anything else
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, file_name) = match key.rsplit_once('/') {
            Some((namespace, file_name)) => (namespace, file_name),
            None => ("", key),
        };

        let digits = file_name
            .strip_prefix(KEY_PREFIX)?
            .strip_suffix(KEY_EXTENSION)?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let timestamp_ms = digits.parse::<i64>().ok()?;

        Some(Self {
            namespace: namespace.to_string(),
            timestamp_ms,
        })
    }

    /// Render the key string stored in the object store
    pub fn to_key(&self) -> String {
        let namespace = self.namespace.trim_matches('/');
        if namespace.is_empty() {
            format!("{}{}{}", KEY_PREFIX, self.timestamp_ms, KEY_EXTENSION)
        } else {
            format!(
                "{}/{}{}{}",
                namespace, KEY_PREFIX, self.timestamp_ms, KEY_EXTENSION
            )
        }
    }
}

/// Generate the key for a recording stopped at `timestamp_ms`
pub fn recording_key(namespace: &str, timestamp_ms: i64) -> String {
    RecordingKey::new(namespace, timestamp_ms).to_key()
}

/// Human-readable identifier for a stored key
///
/// Canonical keys render their timestamp with millisecond precision, so two
/// keys whose timestamps differ never share a display id.
pub fn display_id(key: &str) -> String {
    if let Some(parsed) = RecordingKey::parse(key) {
        if let Some(at) = Utc.timestamp_millis_opt(parsed.timestamp_ms).single() {
            return at.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string();
        }
        return format!("{}{}", KEY_PREFIX, parsed.timestamp_ms);
    }

    let file_name = key.rsplit('/').next().unwrap_or(key);
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// File name used when a clip is saved locally instead of (or as well as) uploaded
pub fn local_file_name(timestamp_ms: i64) -> String {
    format!("recording-{}{}", timestamp_ms, KEY_EXTENSION)
}
