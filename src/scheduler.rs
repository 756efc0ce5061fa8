//! Fixed-interval dual-channel sampling scheduler.
//!
//! Each channel keeps its own due time. A due tick reads the channel and
//! advances the due time by exactly one interval, anchored to the previous
//! due time rather than to the current clock, so cadence never drifts. A tick
//! that arrives late takes a single sample and drops the missed intervals;
//! there is no catch-up burst.

use crate::error::{LoggerError, Result};
use crate::hal::{MotionSource, PositionSource};
use crate::samples::{wall_clock_now, GpsRecord, ImuRecord, MotionSample, PositionReport};
use crate::session::SessionBuffers;
use std::sync::{Arc, Mutex};

pub const IMU_SAMPLE_INTERVAL_MS: u64 = 10;
pub const GPS_SAMPLE_INTERVAL_MS: u64 = 500;

pub type SharedMotionSource = Arc<Mutex<dyn MotionSource>>;
pub type SharedPositionSource = Arc<Mutex<dyn PositionSource>>;

/// Whether a due tick reads its channels on parallel workers or inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// One blocking worker per due channel; tick latency is bounded by the
    /// slower read instead of their sum.
    Concurrent,
    /// Inline reads, IMU first.
    Sequential,
}

#[derive(Debug, Clone)]
pub struct ChannelSchedule {
    interval_ms: u64,
    next_due_ms: u64,
}

impl ChannelSchedule {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due_ms: 0,
        }
    }

    /// Anchor the first due time at the session start.
    pub fn arm(&mut self, start_ms: u64) {
        self.next_due_ms = start_ms;
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_due_ms
    }

    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// One interval forward from the previous due time. Never called without
    /// a taken sample, so due times are unique per record.
    pub fn advance(&mut self) {
        self.next_due_ms += self.interval_ms;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TickReport {
    pub imu_sampled: bool,
    pub gps_sampled: bool,
}

pub struct SamplingScheduler {
    imu: SharedMotionSource,
    gps: SharedPositionSource,
    pub imu_schedule: ChannelSchedule,
    pub gps_schedule: ChannelSchedule,
    mode: SamplingMode,
}

impl SamplingScheduler {
    pub fn new(imu: SharedMotionSource, gps: SharedPositionSource, mode: SamplingMode) -> Self {
        Self {
            imu,
            gps,
            imu_schedule: ChannelSchedule::new(IMU_SAMPLE_INTERVAL_MS),
            gps_schedule: ChannelSchedule::new(GPS_SAMPLE_INTERVAL_MS),
            mode,
        }
    }

    /// Anchor both channels' first due time at the session start.
    pub fn arm(&mut self, start_ms: u64) {
        self.imu_schedule.arm(start_ms);
        self.gps_schedule.arm(start_ms);
    }

    /// One control-loop iteration. Reads every due channel, appends the
    /// completed reads to the session buffers, and advances only the due
    /// times of channels that actually produced a sample: a failed read logs
    /// a warning and leaves its channel due for retry on the next tick.
    pub async fn tick(&mut self, now_ms: u64, buffers: &mut SessionBuffers) -> TickReport {
        let imu_due = self.imu_schedule.is_due(now_ms);
        let gps_due = self.gps_schedule.is_due(now_ms);
        let mut report = TickReport::default();
        if !imu_due && !gps_due {
            return report;
        }

        let (imu_read, gps_read) = match self.mode {
            SamplingMode::Concurrent => self.read_concurrent(imu_due, gps_due).await,
            SamplingMode::Sequential => self.read_sequential(imu_due, gps_due),
        };

        if let Some(result) = imu_read {
            match result {
                Ok(sample) => {
                    buffers.imu.push(ImuRecord {
                        timestamp: wall_clock_now(),
                        elapsed_ms: self.imu_schedule.next_due_ms() - buffers.start_ms,
                        sample,
                    });
                    self.imu_schedule.advance();
                    report.imu_sampled = true;
                }
                Err(e) => log::warn!("imu read failed, channel retried next tick: {e}"),
            }
        }

        if let Some(result) = gps_read {
            match result {
                Ok(position) => {
                    buffers.gps.push(GpsRecord {
                        timestamp: wall_clock_now(),
                        elapsed_ms: self.gps_schedule.next_due_ms() - buffers.start_ms,
                        report: position,
                    });
                    self.gps_schedule.advance();
                    report.gps_sampled = true;
                }
                Err(e) => log::warn!("gps read failed, channel retried next tick: {e}"),
            }
        }

        report
    }

    /// Exactly two workers: both spawned before either is awaited, so the
    /// tick blocks for max(imu latency, gps latency).
    async fn read_concurrent(
        &self,
        imu_due: bool,
        gps_due: bool,
    ) -> (
        Option<Result<MotionSample>>,
        Option<Result<PositionReport>>,
    ) {
        let imu_task = imu_due.then(|| {
            let imu = self.imu.clone();
            tokio::task::spawn_blocking(move || read_motion_locked(&imu))
        });
        let gps_task = gps_due.then(|| {
            let gps = self.gps.clone();
            tokio::task::spawn_blocking(move || read_position_locked(&gps))
        });

        let imu_read = match imu_task {
            Some(handle) => Some(
                handle
                    .await
                    .unwrap_or_else(|e| Err(LoggerError::SensorRead(format!("imu worker: {e}")))),
            ),
            None => None,
        };
        let gps_read = match gps_task {
            Some(handle) => Some(
                handle
                    .await
                    .unwrap_or_else(|e| Err(LoggerError::SensorRead(format!("gps worker: {e}")))),
            ),
            None => None,
        };
        (imu_read, gps_read)
    }

    fn read_sequential(
        &self,
        imu_due: bool,
        gps_due: bool,
    ) -> (
        Option<Result<MotionSample>>,
        Option<Result<PositionReport>>,
    ) {
        let imu_read = imu_due.then(|| read_motion_locked(&self.imu));
        let gps_read = gps_due.then(|| read_position_locked(&self.gps));
        (imu_read, gps_read)
    }
}

fn read_motion_locked(imu: &SharedMotionSource) -> Result<MotionSample> {
    imu.lock()
        .map_err(|_| LoggerError::SensorRead("imu mutex poisoned".to_string()))?
        .read_motion()
}

fn read_position_locked(gps: &SharedPositionSource) -> Result<PositionReport> {
    gps.lock()
        .map_err(|_| LoggerError::SensorRead("gps mutex poisoned".to_string()))?
        .read_position()
}
