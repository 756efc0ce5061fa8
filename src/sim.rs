//! Simulated hardware rig: an in-memory I2C bus modeling the IMU and RTC,
//! a synthetic NMEA stream, memory-backed pins, and a frame-generating
//! camera. Lets the binary and the integration tests run the full session
//! pipeline without a device attached.

use crate::drivers::bno055::BNO055_ID;
use crate::drivers::camera::{CameraConfig, CameraSource};
use crate::drivers::ds3231::dec_to_bcd;
use crate::drivers::gps::frame_sentence;
use crate::error::Result;
use crate::hal::{DigitalInput, DigitalOutput, I2cBus, SerialTransport};
use chrono::{Datelike, Local, Timelike};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const IMU_ADDR: u8 = 0x28;
const RTC_ADDR: u8 = 0x68;

const CHIP_ID_REG: u8 = 0x00;
const ACC_DATA_REG: u8 = 0x08;
const GYR_DATA_REG: u8 = 0x14;

/// In-memory register bus hosting a BNO055 at 0x28 and a DS3231 at 0x68.
///
/// Writes land in a plain register map; data-register reads synthesize a
/// gentle motion waveform so logged sessions contain non-constant values.
pub struct SimBus {
    registers: HashMap<(u8, u8), u8>,
    reads: u64,
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            registers: HashMap::new(),
            reads: 0,
        }
    }

    fn motion_vector(&mut self, reg: u8) -> [i16; 3] {
        self.reads += 1;
        let phase = self.reads as f64 * 0.05;
        match reg {
            // Raw accelerometer counts: 100 LSB per m/s^2, gravity on z
            ACC_DATA_REG => [
                (phase.sin() * 30.0) as i16,
                (phase.cos() * 30.0) as i16,
                981 + ((phase * 2.0).sin() * 10.0) as i16,
            ],
            // Raw gyro counts: 16 LSB per deg/s
            _ => [
                ((phase * 0.5).sin() * 8.0) as i16,
                ((phase * 0.3).cos() * 8.0) as i16,
                ((phase * 1.1).sin() * 16.0) as i16,
            ],
        }
    }

    fn rtc_registers(&self) -> [u8; 7] {
        let now = Local::now();
        [
            dec_to_bcd(now.second() as u8),
            dec_to_bcd(now.minute() as u8),
            dec_to_bcd(now.hour() as u8),
            dec_to_bcd(now.weekday().number_from_monday() as u8),
            dec_to_bcd(now.day() as u8),
            dec_to_bcd(now.month() as u8) | 0x80,
            dec_to_bcd((now.year() % 100) as u8),
        ]
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cBus for SimBus {
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<()> {
        self.registers.insert((addr, reg), value);
        Ok(())
    }

    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8> {
        if addr == IMU_ADDR && reg == CHIP_ID_REG {
            return Ok(BNO055_ID);
        }
        Ok(*self.registers.get(&(addr, reg)).unwrap_or(&0))
    }

    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()> {
        match (addr, reg) {
            (IMU_ADDR, ACC_DATA_REG) | (IMU_ADDR, GYR_DATA_REG) => {
                let raw = self.motion_vector(reg);
                for (i, value) in raw.iter().enumerate() {
                    let bytes = value.to_le_bytes();
                    if i * 2 + 1 < buf.len() {
                        buf[i * 2] = bytes[0];
                        buf[i * 2 + 1] = bytes[1];
                    }
                }
            }
            (RTC_ADDR, 0x00) => {
                let regs = self.rtc_registers();
                let n = buf.len().min(regs.len());
                buf[..n].copy_from_slice(&regs[..n]);
            }
            _ => {
                for (i, slot) in buf.iter_mut().enumerate() {
                    *slot = *self
                        .registers
                        .get(&(addr, reg.wrapping_add(i as u8)))
                        .unwrap_or(&0);
                }
            }
        }
        Ok(())
    }
}

/// Synthetic NMEA feed: reports no fix for the first few reads, then streams
/// alternating RMC/GGA sentences along a slow north-east drift.
pub struct SimNmeaFeed {
    reads: u32,
    fix_after: u32,
    sent: Vec<Vec<u8>>,
}

impl SimNmeaFeed {
    pub fn new(fix_after: u32) -> Self {
        Self {
            reads: 0,
            fix_after,
            sent: Vec::new(),
        }
    }

    fn sentence(&self) -> String {
        let step = self.reads.saturating_sub(self.fix_after) as f64;
        if self.reads < self.fix_after {
            frame_sentence("GPRMC,120000,V,,,,,,,070826,,")
        } else if self.reads % 2 == 0 {
            let lat_minutes = 15.6835 + step * 0.001;
            let body = format!(
                "GPRMC,120000,A,43{lat_minutes:.4},N,07955.1569,W,003.2,084.4,070826,,"
            );
            frame_sentence(&body)
        } else {
            let lat_minutes = 15.6835 + step * 0.001;
            let alt = 98.0 + (step * 0.2).sin();
            let body = format!(
                "GPGGA,120000,43{lat_minutes:.4},N,07955.1569,W,1,08,0.9,{alt:.1},M,36.9,M,,"
            );
            frame_sentence(&body)
        }
    }
}

impl SerialTransport for SimNmeaFeed {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.sent.push(data.to_vec());
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        // One sentence per poll keeps update() bounded like a real 2Hz feed
        if self.reads % 4 == 3 {
            self.reads += 1;
            return Ok(None);
        }
        let line = self.sentence().trim_end().to_string();
        self.reads += 1;
        Ok(Some(line))
    }
}

/// Memory-backed active-low input with a handle for simulated presses.
pub struct SimButton {
    level_low: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct SimButtonHandle {
    level_low: Arc<AtomicBool>,
}

impl SimButton {
    pub fn new() -> (Self, SimButtonHandle) {
        let level_low = Arc::new(AtomicBool::new(false));
        (
            Self {
                level_low: level_low.clone(),
            },
            SimButtonHandle { level_low },
        )
    }
}

impl SimButtonHandle {
    /// Hold the input low briefly, like a human press.
    pub async fn press(&self) {
        self.level_low.store(true, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        self.level_low.store(false, Ordering::SeqCst);
    }
}

impl DigitalInput for SimButton {
    fn is_low(&mut self) -> bool {
        self.level_low.load(Ordering::SeqCst)
    }
}

/// Memory-backed indicator output.
pub struct SimLed {
    level: Arc<AtomicBool>,
}

impl SimLed {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let level = Arc::new(AtomicBool::new(false));
        (
            Self {
                level: level.clone(),
            },
            level,
        )
    }
}

impl DigitalOutput for SimLed {
    fn set_high(&mut self) {
        self.level.store(true, Ordering::SeqCst);
    }

    fn set_low(&mut self) {
        self.level.store(false, Ordering::SeqCst);
    }
}

/// Camera source producing numbered synthetic frames.
pub struct SimCamera {
    frame_counter: u8,
    running: bool,
}

impl SimCamera {
    pub fn new() -> Self {
        Self {
            frame_counter: 0,
            running: false,
        }
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for SimCamera {
    fn configure(&mut self, _config: &CameraConfig) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Vec<u8>> {
        self.frame_counter = self.frame_counter.wrapping_add(1);
        Ok(vec![self.frame_counter; 64])
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }
}
