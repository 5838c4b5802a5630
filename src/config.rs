use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::recognition::ResponseOrdering;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// HTTP API のベース URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// ランドマークストリームの WebSocket
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RecognitionConfig {
    /// "latest_only" または "arrival"
    #[serde(default)]
    pub ordering: ResponseOrdering,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    /// デスクトップウィンドウを開く（`desktop` feature が必要）
    #[serde(default)]
    pub window: bool,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: i32,
    #[serde(default = "default_line_width")]
    pub line_width: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// `tracing_subscriber::EnvFilter` の指定。`RUST_LOG` があればそちらを優先
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_api_url() -> String { "http://127.0.0.1:8000".to_string() }
fn default_stream_url() -> String { "ws://127.0.0.1:8000/capture/ws".to_string() }
fn default_request_timeout_ms() -> u64 { 5000 }
fn default_reconnect_delay_ms() -> u64 { 2000 }
fn default_marker_radius() -> i32 { 5 }
fn default_line_width() -> i32 { 2 }
fn default_log_dir() -> String { "logs".to_string() }
fn default_log_filter() -> String { "gesture_client=info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            stream_url: default_stream_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window: false,
            marker_radius: default_marker_radius(),
            line_width: default_line_width(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl StreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// ファイルがなければデフォルト値。存在してパースできないファイルはエラー
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
