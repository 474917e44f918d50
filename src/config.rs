use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::{
    CANVAS_FRAME_RATE, DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE, DEFAULT_TIME_SLICE_MS,
    PACING_INTERVAL_MS,
};
use crate::capture::placeholder::PlaceholderOptions;
use crate::encoder::recorder::Chunk;
use crate::utils::error::RecorderResult;

pub type DataAvailableHook = Arc<dyn Fn(&Chunk) + Send + Sync>;
pub type StartHook = Arc<dyn Fn() + Send + Sync>;

/// Options of a recording controller
///
/// Loadable from JSON with camelCase keys; missing keys take their default.
/// Hooks cannot be serialized and are set in code.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecorderOptions {
    /// Keep non-empty chunks for `get_recorded_blob`
    pub save_blobs: bool,
    /// Chunk length in milliseconds
    pub time_slice: u64,
    pub mime_type: Option<String>,
    /// Frame rate of the track captured from the surface
    pub frame_rate: u32,
    /// Pacing clock period in milliseconds
    pub pacing_interval: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub placeholder: PlaceholderOptions,

    #[serde(skip)]
    pub on_data_available: Option<DataAvailableHook>,
    #[serde(skip)]
    pub on_start: Option<StartHook>,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            save_blobs: true,
            time_slice: DEFAULT_TIME_SLICE_MS,
            mime_type: None,
            frame_rate: CANVAS_FRAME_RATE,
            pacing_interval: PACING_INTERVAL_MS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            placeholder: PlaceholderOptions::default(),
            on_data_available: None,
            on_start: None,
        }
    }
}

impl RecorderOptions {
    pub fn from_json_str(json: &str) -> RecorderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RecorderResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn time_slice(&self) -> Duration {
        Duration::from_millis(self.time_slice.max(1))
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval.max(1))
    }

    pub fn with_on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(hook));
        self
    }

    pub fn with_on_data_available(mut self, hook: impl Fn(&Chunk) + Send + Sync + 'static) -> Self {
        self.on_data_available = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for RecorderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderOptions")
            .field("save_blobs", &self.save_blobs)
            .field("time_slice", &self.time_slice)
            .field("mime_type", &self.mime_type)
            .field("frame_rate", &self.frame_rate)
            .field("pacing_interval", &self.pacing_interval)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("placeholder", &self.placeholder)
            .field("on_data_available", &self.on_data_available.is_some())
            .field("on_start", &self.on_start.is_some())
            .finish()
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
