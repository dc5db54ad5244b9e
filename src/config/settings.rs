//! Settings structs, defaults, TOML persistence and environment overrides.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Credentials are never written to disk — they come exclusively from the
//! environment (`DROPBOX_TOKEN`, `API_TOKEN`).

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture device and the pre-record buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Samples per frame per channel read from the device in one chunk.
    pub chunk_size: u32,
    /// Sample width in bits. Only 16-bit PCM is supported.
    pub bit_depth: u16,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels (2 = stereo).
    pub channels: u16,
    /// Seconds of audio retained in the rolling pre-record buffer.
    pub prerecord_secs: u32,
    /// Preferred input device name prefix (e.g. `"KT-USB"`). `None` falls
    /// back to the first device with enough input channels.
    pub device_name: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            bit_depth: 16,
            sample_rate: 48_000,
            channels: 2,
            prerecord_secs: 30,
            device_name: Some("KT-USB".into()),
        }
    }
}

impl AudioConfig {
    /// Capacity of the pre-record ring buffer in chunks.
    ///
    /// `sample_rate * prerecord_secs / chunk_size`, floored. At the default
    /// 48 kHz / 1024-sample chunks / 30 s this is 1406 chunks.
    pub fn prebuffer_chunks(&self) -> usize {
        (self.sample_rate as u64 * self.prerecord_secs as u64 / self.chunk_size as u64) as usize
    }

    /// Sample width in bytes, derived from `bit_depth`.
    pub fn sample_width(&self) -> u16 {
        self.bit_depth / 8
    }
}

// ---------------------------------------------------------------------------
// PathsConfig
// ---------------------------------------------------------------------------

/// Where recordings land and where processed files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory for raw WAV takes.
    pub record_dir: String,
    /// Directory for transcoded MP3s (may equal `record_dir`).
    pub process_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            record_dir: "./record".into(),
            process_dir: "./record".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Cloud storage (Dropbox) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Upload destination used when no session context is available.
    pub default_dir: String,
    /// Access token from `DROPBOX_TOKEN`. `None` disables uploads entirely.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_dir: "/default".into(),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Remote session-metadata API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the recorder endpoint.
    pub url: String,
    /// Token from `API_TOKEN`. `None` means the box runs standalone: no
    /// context fetch, no completion notification.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "https://stage.elzwave.de/api/recorder/".into(),
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

/// Where log output is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Journald picks stdout up from the unit; this is the deployment default.
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub target: LogTarget,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            target: LogTarget::Stdout,
        }
    }
}

// ---------------------------------------------------------------------------
// Settings  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// # Loading order
///
/// 1. Defaults (the values the original deployment ships with).
/// 2. `settings.toml` if present.
/// 3. Environment overrides (`STAGEBOX_*` plus the two credential vars).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub audio: AudioConfig,
    pub paths: PathsConfig,
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Load configuration from the platform-appropriate `settings.toml` and
    /// apply environment overrides.
    ///
    /// Returns defaults (plus env overrides) when the file does not exist so
    /// callers never need to special-case a fresh device.
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&AppPaths::new().settings_file)?;
        settings.apply_env();
        Ok(settings)
    }

    /// Load from an explicit path without env overrides (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save to an explicit path, creating parent directories as needed.
    /// Credentials are `#[serde(skip)]` and never land on disk.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides on top of the current values.
    fn apply_env(&mut self) {
        if let Some(v) = env_u32("STAGEBOX_CHUNK_SIZE") {
            self.audio.chunk_size = v;
        }
        if let Some(v) = env_u32("STAGEBOX_BIT_DEPTH") {
            self.audio.bit_depth = v as u16;
        }
        if let Some(v) = env_u32("STAGEBOX_SAMPLE_RATE") {
            self.audio.sample_rate = v;
        }
        if let Some(v) = env_u32("STAGEBOX_CHANNELS") {
            self.audio.channels = v as u16;
        }
        if let Some(v) = env_u32("STAGEBOX_PRERECORD_SECS") {
            self.audio.prerecord_secs = v;
        }
        if let Ok(v) = std::env::var("STAGEBOX_DEVICE") {
            self.audio.device_name = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("STAGEBOX_RECORD_DIR") {
            self.paths.record_dir = v;
        }
        if let Ok(v) = std::env::var("STAGEBOX_PROCESS_DIR") {
            self.paths.process_dir = v;
        }
        if let Ok(v) = std::env::var("STAGEBOX_API_URL") {
            self.api.url = v;
        }
        if let Ok(v) = std::env::var("STAGEBOX_LOG_TARGET") {
            match v.as_str() {
                "stdout" => self.log.target = LogTarget::Stdout,
                "stderr" => self.log.target = LogTarget::Stderr,
                other => log::warn!("ignoring unknown STAGEBOX_LOG_TARGET={other:?}"),
            }
        }
        self.storage.token = non_empty(std::env::var("DROPBOX_TOKEN").ok());
        self.api.token = non_empty(std::env::var("API_TOKEN").ok());
    }
}

fn env_u32(name: &str) -> Option<u32> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparseable {name}={raw:?}");
            None
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
