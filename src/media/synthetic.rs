//! Synthetic sources: constant colour, test pattern, externally fed frames,
//! sine tone and silence.

use std::f64::consts::TAU;
use std::time::Instant;

use parking_lot::Mutex;

use crate::media::track::{AudioSource, VideoSource};
use crate::pipeline::types::{Timestamp, VideoFrame};

/// Always shows the same colour
pub struct SolidColorSource {
    frame: VideoFrame,
    started: Instant,
}

impl SolidColorSource {
    pub fn new(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            frame: VideoFrame::solid(width, height, rgba, Timestamp::default()),
            started: Instant::now(),
        }
    }
}

impl VideoSource for SolidColorSource {
    fn current_frame(&self) -> Option<VideoFrame> {
        let mut frame = self.frame.clone();
        frame.pts = Timestamp::from_duration(self.started.elapsed());
        Some(frame)
    }
}

/// Vertical colour bars scrolling horizontally over time
pub struct TestPatternSource {
    width: u32,
    height: u32,
    pixels_per_second: f64,
    started: Instant,
}

const BARS: [[u8; 4]; 7] = [
    [192, 192, 192, 255],
    [192, 192, 0, 255],
    [0, 192, 192, 255],
    [0, 192, 0, 255],
    [192, 0, 192, 255],
    [192, 0, 0, 255],
    [0, 0, 192, 255],
];

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels_per_second: width as f64 / 4.0,
            started: Instant::now(),
        }
    }
}

impl VideoSource for TestPatternSource {
    fn current_frame(&self) -> Option<VideoFrame> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let elapsed = self.started.elapsed();
        let shift = (elapsed.as_secs_f64() * self.pixels_per_second) as u32;
        let bar_width = (self.width / BARS.len() as u32).max(1);

        let mut row = Vec::with_capacity(self.width as usize * 4);
        for x in 0..self.width {
            let bar = (((x + shift) / bar_width) as usize) % BARS.len();
            row.extend_from_slice(&BARS[bar]);
        }
        let mut data = Vec::with_capacity(row.len() * self.height as usize);
        for _ in 0..self.height {
            data.extend_from_slice(&row);
        }

        Some(VideoFrame {
            width: self.width,
            height: self.height,
            data: data.into(),
            pts: Timestamp::from_duration(elapsed),
        })
    }
}

/// Holds whatever frame was pushed last
///
/// Lets a host with its own capture loop feed frames into a track at any rate.
#[derive(Default)]
pub struct LatestFrameSource {
    latest: Mutex<Option<VideoFrame>>,
}

impl LatestFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, frame: VideoFrame) {
        *self.latest.lock() = Some(frame);
    }
}

impl VideoSource for LatestFrameSource {
    fn current_frame(&self) -> Option<VideoFrame> {
        self.latest.lock().clone()
    }

    fn stop(&self) {
        self.latest.lock().take();
    }
}

/// Sine tone, identical on every channel
pub struct ToneSource {
    frequency: f64,
    amplitude: f32,
    sample_rate: u32,
    channels: u16,
    position: Mutex<u64>,
}

impl ToneSource {
    pub fn new(frequency: f64, amplitude: f32, sample_rate: u32, channels: u16) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            position: Mutex::new(0),
        }
    }
}

impl AudioSource for ToneSource {
    fn read(&self, out: &mut [f32]) -> usize {
        let channels = self.channels as usize;
        let mut position = self.position.lock();
        let mut written = 0;
        for frame in out.chunks_exact_mut(channels) {
            let t = *position as f64 / self.sample_rate as f64;
            let value = self.amplitude * (TAU * self.frequency * t).sin() as f32;
            frame.fill(value);
            *position += 1;
            written += channels;
        }
        written
    }
}

/// Endless digital silence
pub struct SilenceSource;

impl AudioSource for SilenceSource {
    fn read(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);
        out.len()
    }
}
