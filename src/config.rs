use crate::capture::{CaptureConfig, CONTENT_TYPE_WEBM};
use crate::http::SessionRetention;
use crate::session::SessionConfig;
use crate::store::SignedUrlConfig;
use anyhow::{ensure, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub capture: CaptureSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Seconds a finished session (and its local clip) stays queryable
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Seconds without a fragment before a recording session is abandoned
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
    #[serde(default = "default_session_sweep_secs")]
    pub session_sweep_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the filesystem store (`~` is expanded)
    pub root: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub public_base_url: String,
    pub signing_secret: String,
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_fragment_bytes")]
    pub fragment_bytes: usize,
    #[serde(default = "default_fragment_interval_ms")]
    pub fragment_interval_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
            fragment_bytes: default_fragment_bytes(),
            fragment_interval_ms: default_fragment_interval_ms(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_session_idle_secs() -> u64 {
    600
}

fn default_session_sweep_secs() -> u64 {
    30
}

fn default_namespace() -> String {
    "public".to_string()
}

fn default_url_ttl_secs() -> u64 {
    900
}

fn default_content_type() -> String {
    CONTENT_TYPE_WEBM.to_string()
}

fn default_fragment_bytes() -> usize {
    16 * 1024
}

fn default_fragment_interval_ms() -> u64 {
    250
}

impl Config {
    /// Load `path` (any format the `config` crate knows, extension optional)
    /// with `VOICE_VAULT__SECTION__KEY` environment overrides on top
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICE_VAULT").separator("__"))
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;

        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.capture.content_type == CONTENT_TYPE_WEBM,
            "capture.content_type must be {}, got {}",
            CONTENT_TYPE_WEBM,
            self.capture.content_type
        );
        ensure!(
            !self.storage.signing_secret.is_empty(),
            "storage.signing_secret must not be empty"
        );
        ensure!(
            self.capture.fragment_bytes > 0,
            "capture.fragment_bytes must be greater than 0"
        );
        ensure!(
            self.capture.fragment_interval_ms > 0,
            "capture.fragment_interval_ms must be greater than 0"
        );
        ensure!(
            self.service.session_sweep_secs > 0,
            "service.session_sweep_secs must be greater than 0"
        );
        Ok(())
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.storage.root).as_ref())
    }

    pub fn signed_urls(&self) -> SignedUrlConfig {
        SignedUrlConfig {
            public_base_url: self.storage.public_base_url.clone(),
            secret: self.storage.signing_secret.clone(),
            ttl: chrono::Duration::seconds(self.storage.url_ttl_secs as i64),
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            namespace: self.storage.namespace.clone(),
            content_type: self.capture.content_type.clone(),
            ..SessionConfig::default()
        }
    }

    pub fn session_retention(&self) -> SessionRetention {
        SessionRetention {
            finished: Duration::from_secs(self.service.session_ttl_secs),
            idle: Duration::from_secs(self.service.session_idle_secs),
        }
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.service.session_sweep_secs)
    }

    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            fragment_bytes: self.capture.fragment_bytes,
            fragment_interval: Duration::from_millis(self.capture.fragment_interval_ms),
            ..CaptureConfig::default()
        }
    }
}
