//! Recording backend
//!
//! `container` is the byte format, `recorder` the time-sliced writer that
//! produces it from a live stream.

pub mod container;
pub mod recorder;

pub use container::{ChunkWriter, Record, decode_records};
pub use recorder::{
    Chunk, ChunkedRecorder, RecorderEvent, RecorderFactory, StreamRecorder, StreamRecorderFactory,
    is_type_supported,
};
