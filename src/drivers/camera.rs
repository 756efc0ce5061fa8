//! Video recorder bound to an injected camera source.

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

pub const RESOLUTION: (u32, u32) = (1280, 720); // 720p
pub const FRAME_INTERVAL: Duration = Duration::from_micros(33333); // 30 FPS

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub frame_interval: Duration,
    pub vflip: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: RESOLUTION.0,
            height: RESOLUTION.1,
            frame_interval: FRAME_INTERVAL,
            vflip: true,
        }
    }
}

/// Frame producer behind the recorder. Configured once, then polled for
/// frames until stopped.
pub trait CameraSource: Send {
    fn configure(&mut self, config: &CameraConfig) -> Result<()>;
    fn start(&mut self) -> Result<()>;
    fn capture_frame(&mut self) -> Result<Vec<u8>>;
    fn stop(&mut self) -> Result<()>;
}

/// Captures frames on the session loop's cadence and appends them to the
/// session's video file.
///
/// `record` blocks for as long as the source takes to hand over a frame;
/// there is no capture timeout yet, so a wedged camera stalls the current
/// loop iteration. TODO: bound capture with a deadline once the camera
/// source grows an async interface.
pub struct VideoRecorder {
    source: Box<dyn CameraSource>,
    sink: BufWriter<File>,
    frames_written: u64,
}

impl VideoRecorder {
    pub fn new(mut source: Box<dyn CameraSource>, path: &Path) -> Result<Self> {
        source.configure(&CameraConfig::default())?;
        source.start()?;
        let sink = BufWriter::new(File::create(path)?);
        Ok(Self {
            source,
            sink,
            frames_written: 0,
        })
    }

    /// Capture one frame and append it to the video file.
    pub fn record(&mut self) -> Result<()> {
        let frame = self.source.capture_frame()?;
        self.sink.write_all(&frame)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Stop the camera and flush the file. Hands the camera source back for
    /// the next session along with the frame count.
    pub fn stop(mut self) -> Result<(Box<dyn CameraSource>, u64)> {
        self.source.stop()?;
        self.sink.flush()?;
        Ok((self.source, self.frames_written))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
