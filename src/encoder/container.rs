//! `mixcast` raw container
//!
//! ```text
//! file   := header record*
//! header := "MXC1" version:u8
//! record := tag:u8 pts:i64le len:u32le payload[len]
//! V      := width:u32le height:u32le rgba[width*height*4]
//! A      := sample_rate:u32le channels:u16le f32le*
//! ```
//!
//! The header is only written into the first chunk, so concatenating every
//! chunk of a session in order yields a complete file.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::assets::{CONTAINER_MAGIC, CONTAINER_VERSION};
use crate::pipeline::types::{Timestamp, VideoFrame};
use crate::utils::error::{RecorderError, RecorderResult};

const TAG_VIDEO: u8 = b'V';
const TAG_AUDIO: u8 = b'A';
const HEADER_LEN: usize = 5;
const RECORD_HEADER_LEN: usize = 1 + 8 + 4;

/// Accumulates records between two chunk boundaries
#[derive(Debug, Default)]
pub struct ChunkWriter {
    buf: BytesMut,
    header_written: bool,
    records: usize,
}

impl ChunkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_header(&mut self) {
        if !self.header_written {
            self.buf.put_slice(CONTAINER_MAGIC);
            self.buf.put_u8(CONTAINER_VERSION);
            self.header_written = true;
        }
    }

    fn put_record_header(&mut self, tag: u8, pts: Timestamp, len: usize) {
        self.ensure_header();
        self.buf.reserve(RECORD_HEADER_LEN + len);
        self.buf.put_u8(tag);
        self.buf.put_i64_le(pts.micros);
        self.buf.put_u32_le(len as u32);
        self.records += 1;
    }

    pub fn write_video(&mut self, frame: &VideoFrame, pts: Timestamp) {
        self.put_record_header(TAG_VIDEO, pts, 8 + frame.data.len());
        self.buf.put_u32_le(frame.width);
        self.buf.put_u32_le(frame.height);
        self.buf.put_slice(&frame.data);
    }

    pub fn write_audio(&mut self, sample_rate: u32, channels: u16, samples: &[f32], pts: Timestamp) {
        self.put_record_header(TAG_AUDIO, pts, 6 + samples.len() * 4);
        self.buf.put_u32_le(sample_rate);
        self.buf.put_u16_le(channels);
        for sample in samples {
            self.buf.put_f32_le(*sample);
        }
    }

    /// Records written since the last `take_chunk`
    pub fn pending_records(&self) -> usize {
        self.records
    }

    /// Hand out everything buffered so far. Empty when nothing was written.
    pub fn take_chunk(&mut self) -> Bytes {
        self.records = 0;
        self.buf.split().freeze()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Video {
        pts: Timestamp,
        width: u32,
        height: u32,
        data: Bytes,
    },
    Audio {
        pts: Timestamp,
        sample_rate: u32,
        channels: u16,
        samples: Vec<f32>,
    },
}

impl Record {
    pub fn pts(&self) -> Timestamp {
        match self {
            Record::Video { pts, .. } | Record::Audio { pts, .. } => *pts,
        }
    }
}

fn malformed(what: &str) -> RecorderError {
    RecorderError::InvalidArgument(format!("malformed container: {}", what))
}

/// Parse a complete file (all chunks of a session concatenated)
pub fn decode_records(data: &[u8]) -> RecorderResult<Vec<Record>> {
    let mut buf = data;
    if buf.remaining() < HEADER_LEN || &buf[..4] != CONTAINER_MAGIC {
        return Err(malformed("bad header"));
    }
    buf.advance(4);
    let version = buf.get_u8();
    if version != CONTAINER_VERSION {
        return Err(malformed(&format!("unsupported version {}", version)));
    }

    let mut records = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < RECORD_HEADER_LEN {
            return Err(malformed("truncated record header"));
        }
        let tag = buf.get_u8();
        let pts = Timestamp::from_micros(buf.get_i64_le());
        let len = buf.get_u32_le() as usize;
        if buf.remaining() < len {
            return Err(malformed("truncated payload"));
        }
        let (mut payload, rest) = buf.split_at(len);
        buf = rest;

        let record = match tag {
            TAG_VIDEO => {
                if payload.remaining() < 8 {
                    return Err(malformed("short video payload"));
                }
                let width = payload.get_u32_le();
                let height = payload.get_u32_le();
                if payload.remaining() != (width as usize) * (height as usize) * 4 {
                    return Err(malformed("video size mismatch"));
                }
                Record::Video {
                    pts,
                    width,
                    height,
                    data: Bytes::copy_from_slice(payload),
                }
            }
            TAG_AUDIO => {
                if payload.remaining() < 6 || (payload.remaining() - 6) % 4 != 0 {
                    return Err(malformed("bad audio payload"));
                }
                let sample_rate = payload.get_u32_le();
                let channels = payload.get_u16_le();
                let mut samples = Vec::with_capacity(payload.remaining() / 4);
                while payload.has_remaining() {
                    samples.push(payload.get_f32_le());
                }
                Record::Audio {
                    pts,
                    sample_rate,
                    channels,
                    samples,
                }
            }
            other => return Err(malformed(&format!("unknown tag {:#04x}", other))),
        };
        records.push(record);
    }
    Ok(records)
}
