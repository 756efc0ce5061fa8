//! Hardware seams: bus, serial, and pin traits the drivers are written
//! against, plus the real UART transport for the GPS receiver.

use crate::error::{LoggerError, Result};
use crate::samples::{MotionSample, PositionReport};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Register-oriented I2C bus. One transaction in flight at a time; callers
/// share a bus through [`SharedBus`] so IMU and RTC traffic never interleave.
pub trait I2cBus: Send {
    fn write_register(&mut self, addr: u8, reg: u8, value: u8) -> Result<()>;
    fn read_register(&mut self, addr: u8, reg: u8) -> Result<u8>;
    fn read_block(&mut self, addr: u8, reg: u8, buf: &mut [u8]) -> Result<()>;
}

pub type SharedBus = Arc<Mutex<dyn I2cBus>>;

/// Acquire the bus for a single transaction.
pub fn lock_bus(bus: &SharedBus) -> Result<std::sync::MutexGuard<'_, dyn I2cBus + '_>> {
    bus.lock()
        .map_err(|_| LoggerError::Bus("bus mutex poisoned".to_string()))
}

/// Line-oriented serial link to the GPS receiver.
pub trait SerialTransport: Send {
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Next complete line without its terminator, or `None` when the read
    /// timed out before one arrived. Must not block past the transport's
    /// configured timeout.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Inertial channel as the scheduler sees it.
pub trait MotionSource: Send {
    fn read_motion(&mut self) -> Result<MotionSample>;
}

/// Position channel as the scheduler and fix indicator see it. Implementors
/// carry internal parser state, so one instance must sit behind a single
/// mutex when shared.
pub trait PositionSource: Send {
    fn fix(&mut self) -> Result<bool>;
    fn read_position(&mut self) -> Result<PositionReport>;
}

/// Formatted wall-clock collaborator; session names derive from it.
pub trait TimeSource: Send {
    fn now(&mut self) -> Result<String>;
}

/// Active-low digital input (pull-up wiring, pressed reads low).
pub trait DigitalInput: Send {
    fn is_low(&mut self) -> bool;
}

/// Digital output driving an indicator.
pub trait DigitalOutput: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Serial port transport backed by tokio-serial's blocking port handle.
pub struct UartTransport {
    port: Box<dyn tokio_serial::SerialPort>,
    pending: Vec<u8>,
}

impl UartTransport {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = tokio_serial::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| LoggerError::Configuration(format!("serial open {path}: {e}")))?;
        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }
}

impl SerialTransport for UartTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.port
            .write_all(data)
            .map_err(|e| LoggerError::SensorRead(format!("serial write: {e}")))
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let mut chunk = [0u8; 256];
            match self.port.read(&mut chunk) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(LoggerError::SensorRead(format!("serial read: {e}"))),
            }
        }
    }
}

/// Wrap a concrete bus in the shared handle used across drivers.
pub fn shared_bus<B: I2cBus + 'static>(bus: B) -> SharedBus {
    Arc::new(Mutex::new(bus))
}
