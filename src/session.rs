//! Session lifecycle: the button-driven state machine that owns the sampling
//! loop, the per-session buffers, and file emission on close.

use crate::buttons::{ButtonEvent, ButtonSource};
use crate::drivers::camera::{CameraSource, VideoRecorder};
use crate::error::Result;
use crate::hal::{DigitalOutput, TimeSource};
use crate::report::{render_gps_block, render_imu_block, SessionSummary};
use crate::samples::{GpsRecord, ImuRecord};
use crate::scheduler::SamplingScheduler;
use crate::storage::{session_file_stem, SessionPaths};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;

/// Session state machine states. The controller runs until process shutdown;
/// there is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
}

/// In-memory sample buffers for one session. Appended to by the scheduler,
/// rendered and flushed on the stop transition.
#[derive(Debug)]
pub struct SessionBuffers {
    /// RTC-formatted start time; also the session id.
    pub started_at: String,
    /// Monotonic offset of the session start.
    pub start_ms: u64,
    pub imu: Vec<ImuRecord>,
    pub gps: Vec<GpsRecord>,
}

impl SessionBuffers {
    pub fn new(started_at: String, start_ms: u64) -> Self {
        Self {
            started_at,
            start_ms,
            imu: Vec::new(),
            gps: Vec::new(),
        }
    }
}

struct ActiveSession {
    buffers: SessionBuffers,
    file: BufWriter<File>,
    paths: SessionPaths,
    recorder: Option<VideoRecorder>,
}

pub struct SessionController {
    state: SessionState,
    scheduler: SamplingScheduler,
    rtc: Box<dyn TimeSource>,
    session_led: Box<dyn DigitalOutput>,
    events: Receiver<ButtonEvent>,
    camera: Option<Box<dyn CameraSource>>,
    video_armed: bool,
    output_dir: PathBuf,
    epoch: Instant,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: SamplingScheduler,
        rtc: Box<dyn TimeSource>,
        session_led: Box<dyn DigitalOutput>,
        events: Receiver<ButtonEvent>,
        camera: Option<Box<dyn CameraSource>>,
        video_armed: bool,
        output_dir: PathBuf,
        epoch: Instant,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            scheduler,
            rtc,
            session_led,
            events,
            camera,
            video_armed,
            output_dir,
            epoch,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Drive the state machine until the event channel closes. Transient
    /// sensor faults stay inside the loop; I/O failures on the session file
    /// propagate after indicators are reset.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let Some(event) = self.events.recv().await else {
                return Ok(());
            };
            match event.source {
                ButtonSource::RecordToggle => {
                    self.video_armed = !self.video_armed;
                    log::info!("video recording armed: {}", self.video_armed);
                }
                ButtonSource::SessionToggle => {
                    let mut active = self.start_session()?;
                    self.state = SessionState::Active;
                    log::info!("session {} started", active.buffers.started_at);

                    let stopped = self.run_active(&mut active).await;
                    self.state = SessionState::Idle;
                    self.close_session(active)?;
                    stopped?;
                }
            }
        }
    }

    /// IDLE -> ACTIVE: indicator on, start time from the RTC, output file
    /// opened, buffers initialized, both channels armed at the start time,
    /// recorder bound when the recording toggle is armed.
    fn start_session(&mut self) -> Result<ActiveSession> {
        self.session_led.set_high();
        match self.open_session() {
            Ok(active) => Ok(active),
            Err(e) => {
                self.session_led.set_low();
                Err(e)
            }
        }
    }

    fn open_session(&mut self) -> Result<ActiveSession> {
        let started_at = self.rtc.now()?;
        let paths = SessionPaths::new(&self.output_dir, &started_at);
        let file = BufWriter::new(File::create(&paths.log)?);

        let start_ms = self.now_ms();
        self.scheduler.arm(start_ms);

        let recorder = if self.video_armed {
            match self.camera.take() {
                Some(camera) => Some(VideoRecorder::new(camera, &paths.video)?),
                None => {
                    log::warn!("recording armed but no camera attached");
                    None
                }
            }
        } else {
            None
        };

        Ok(ActiveSession {
            buffers: SessionBuffers::new(started_at, start_ms),
            file,
            paths,
            recorder,
        })
    }

    /// One loop iteration per scheduler tick: sample, capture a video frame,
    /// then drain the button channel exactly once.
    async fn run_active(&mut self, active: &mut ActiveSession) -> Result<()> {
        loop {
            let now = self.now_ms();
            self.scheduler.tick(now, &mut active.buffers).await;

            if let Some(recorder) = active.recorder.as_mut() {
                if let Err(e) = recorder.record() {
                    log::warn!("video frame capture failed: {e}");
                }
            }

            let mut stop = false;
            while let Ok(event) = self.events.try_recv() {
                match event.source {
                    ButtonSource::SessionToggle => stop = true,
                    ButtonSource::RecordToggle => {
                        self.video_armed = !self.video_armed;
                    }
                }
            }
            if stop {
                return Ok(());
            }

            sleep(Duration::from_millis(1)).await;
        }
    }

    /// ACTIVE -> IDLE: indicator off, recorder stopped and flushed, both
    /// buffers rendered as sequential tabulated blocks, file closed, summary
    /// written.
    fn close_session(&mut self, active: ActiveSession) -> Result<()> {
        self.session_led.set_low();

        let mut video_frames = 0;
        let video_enabled = active.recorder.is_some();
        if let Some(recorder) = active.recorder {
            let (camera, frames) = recorder.stop()?;
            self.camera = Some(camera);
            video_frames = frames;
        }

        let duration_ms = self.now_ms().saturating_sub(active.buffers.start_ms);
        let mut file = active.file;
        file.write_all(render_imu_block(&active.buffers.imu).as_bytes())?;
        file.write_all(b"\n")?;
        file.write_all(render_gps_block(&active.buffers.gps).as_bytes())?;
        file.flush()?;
        drop(file);

        let summary = SessionSummary {
            session_id: session_file_stem(&active.buffers.started_at),
            started_at: active.buffers.started_at.clone(),
            duration_ms,
            imu_records: active.buffers.imu.len(),
            gps_records: active.buffers.gps.len(),
            video_enabled,
            video_frames,
        };
        summary.save(&active.paths.summary)?;

        log::info!(
            "session {} closed: {} imu records, {} gps records, {} video frames, {}",
            active.buffers.started_at,
            active.buffers.imu.len(),
            active.buffers.gps.len(),
            video_frames,
            active.paths.log.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::camera::{CameraConfig, CameraSource};
    use crate::error::{LoggerError, Result};
    use crate::hal::{MotionSource, PositionSource};
    use crate::samples::{MotionSample, PositionReport};
    use crate::scheduler::SamplingMode;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    struct StubImu;

    impl MotionSource for StubImu {
        fn read_motion(&mut self) -> Result<MotionSample> {
            Ok(MotionSample::new([0.0, 0.0, 9.8], [0.0, 0.0, 0.0]))
        }
    }

    struct StubGps;

    impl PositionSource for StubGps {
        fn fix(&mut self) -> Result<bool> {
            Ok(true)
        }

        fn read_position(&mut self) -> Result<PositionReport> {
            Ok(PositionReport::new(43.2614, -79.9193, 98.0, 1.5))
        }
    }

    struct StubRtc;

    impl TimeSource for StubRtc {
        fn now(&mut self) -> Result<String> {
            Ok("2026-08-07 12:00:00".to_string())
        }
    }

    struct RecordingLed(Arc<AtomicBool>);

    impl DigitalOutput for RecordingLed {
        fn set_high(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }

        fn set_low(&mut self) {
            self.0.store(false, Ordering::SeqCst);
        }
    }

    struct StubCamera;

    impl CameraSource for StubCamera {
        fn configure(&mut self, _config: &CameraConfig) -> Result<()> {
            Ok(())
        }

        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn capture_frame(&mut self) -> Result<Vec<u8>> {
            Ok(vec![0u8; 16])
        }

        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler() -> SamplingScheduler {
        SamplingScheduler::new(
            Arc::new(Mutex::new(StubImu)),
            Arc::new(Mutex::new(StubGps)),
            SamplingMode::Sequential,
        )
    }

    fn test_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "trip_logger_test_{tag}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn toggle(source: ButtonSource) -> ButtonEvent {
        ButtonEvent { source, edge_ms: 0 }
    }

    #[tokio::test]
    async fn test_start_then_immediate_stop_emits_well_formed_file() {
        let dir = test_dir("immediate_stop");
        let led_on = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(8);

        let mut controller = SessionController::new(
            scheduler(),
            Box::new(StubRtc),
            Box::new(RecordingLed(led_on.clone())),
            rx,
            None,
            false,
            dir.clone(),
            Instant::now(),
        );

        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        drop(tx);

        controller.run().await.unwrap();
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(!led_on.load(Ordering::SeqCst));

        let log = std::fs::read_to_string(dir.join("2026-08-07_12-00-00.log")).unwrap();
        assert!(log.contains("Acceleration (m/s^2)"));
        assert!(log.contains("Latitude (deg)"));

        let summary = std::fs::read_to_string(dir.join("2026-08-07_12-00-00.json")).unwrap();
        let summary: SessionSummary = serde_json::from_str(&summary).unwrap();
        assert!(!summary.video_enabled);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_session_records_while_active() {
        let dir = test_dir("records");
        let (tx, rx) = mpsc::channel(8);

        let mut controller = SessionController::new(
            scheduler(),
            Box::new(StubRtc),
            Box::new(RecordingLed(Arc::new(AtomicBool::new(false)))),
            rx,
            None,
            false,
            dir.clone(),
            Instant::now(),
        );

        let runner = tokio::spawn(async move {
            let result = controller.run().await;
            (controller, result)
        });

        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        drop(tx);

        let (_, result) = runner.await.unwrap();
        result.unwrap();

        let summary = std::fs::read_to_string(dir.join("2026-08-07_12-00-00.json")).unwrap();
        let summary: SessionSummary = serde_json::from_str(&summary).unwrap();
        assert!(summary.imu_records >= 2, "got {}", summary.imu_records);
        assert!(summary.gps_records >= 1);
        assert!(summary.imu_records >= summary.gps_records);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_record_toggle_arms_video() {
        let dir = test_dir("video");
        let (tx, rx) = mpsc::channel(8);

        let mut controller = SessionController::new(
            scheduler(),
            Box::new(StubRtc),
            Box::new(RecordingLed(Arc::new(AtomicBool::new(false)))),
            rx,
            Some(Box::new(StubCamera)),
            false,
            dir.clone(),
            Instant::now(),
        );

        tx.send(toggle(ButtonSource::RecordToggle)).await.unwrap();
        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        drop(tx);

        controller.run().await.unwrap();

        let summary = std::fs::read_to_string(dir.join("2026-08-07_12-00-00.json")).unwrap();
        let summary: SessionSummary = serde_json::from_str(&summary).unwrap();
        assert!(summary.video_enabled);
        assert!(summary.video_frames >= 1);
        assert!(dir.join("2026-08-07_12-00-00.mp4").exists());

        // Camera handed back for the next session
        assert!(controller.camera.is_some());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_open_failure_is_fatal_and_resets_indicator() {
        let led_on = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(8);

        let mut controller = SessionController::new(
            scheduler(),
            Box::new(StubRtc),
            Box::new(RecordingLed(led_on.clone())),
            rx,
            None,
            false,
            PathBuf::from("/nonexistent/trip_logger_output"),
            Instant::now(),
        );

        tx.send(toggle(ButtonSource::SessionToggle)).await.unwrap();
        drop(tx);

        match controller.run().await {
            Err(LoggerError::Io(_)) => {}
            other => panic!("expected Io error, got {other:?}"),
        }
        assert!(!led_on.load(Ordering::SeqCst));
        assert_eq!(controller.state(), SessionState::Idle);
    }
}
