use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::CaptureKind;
use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub connection: ConnectionConfig,
    pub capture: CaptureConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub url: String,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    pub slice_ms: u64,
    pub fragment_bytes: usize,
    /// Stream this file instead of synthetic audio
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub uploads_path: String,
}

impl Config {
    /// Load `path` (any format the config crate knows, extension optional)
    /// over built-in defaults, then `VOICE_STREAM__SECTION__KEY` overrides.
    /// A missing file is not an error.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "voice-stream")?
            .set_default("connection.url", "ws://127.0.0.1:8000/ws/")?
            .set_default("connection.reconnect_delay_ms", 3000_i64)?
            .set_default("capture.slice_ms", 100_i64)?
            .set_default("capture.fragment_bytes", 1600_i64)?
            .set_default("server.bind", "127.0.0.1")?
            .set_default("server.port", 8000_i64)?
            .set_default("server.uploads_path", "uploads")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("VOICE_STREAM").separator("__"),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        if cfg.capture.slice_ms == 0 {
            bail!("capture.slice_ms must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            server_url: self.connection.url.clone(),
            reconnect_delay: Duration::from_millis(self.connection.reconnect_delay_ms),
            fragment_slice: Duration::from_millis(self.capture.slice_ms),
        }
    }

    pub fn capture_kind(&self) -> CaptureKind {
        match &self.capture.file {
            Some(path) => CaptureKind::File(PathBuf::from(path)),
            None => CaptureKind::Synthetic,
        }
    }
}
