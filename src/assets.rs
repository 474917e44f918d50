/// Frame rate of the track captured from the drawable surface
pub const CANVAS_FRAME_RATE: u32 = 25;
/// Interval between pacing clock ticks
pub const PACING_INTERVAL_MS: u64 = 33;

/// Surface size used when a source advertises no dimensions and has no frame yet
pub const FALLBACK_WIDTH: u32 = 1280;
pub const FALLBACK_HEIGHT: u32 = 720;

// recording
pub const DEFAULT_TIME_SLICE_MS: u64 = 1000;
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNELS: u16 = 2;
pub const TICK_CHANNEL_CAPACITY: usize = 4;
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

// container
pub const MIXCAST_MIME_TYPE: &str = "video/x-mixcast";
pub const MIXCAST_MIME_TYPE_CODECS: &str = "video/x-mixcast;codecs=\"rgba,f32le\"";
pub const CONTAINER_MAGIC: &[u8; 4] = b"MXC1";
pub const CONTAINER_VERSION: u8 = 1;

// export
pub const DEFAULT_FILE_NAME: &str = "recording.mxc";
