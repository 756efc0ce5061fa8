//! BNO055 IMU driver over a shared I2C bus.

use crate::error::{LoggerError, Result};
use crate::hal::{lock_bus, MotionSource, SharedBus};
use crate::samples::MotionSample;
use std::time::Duration;

// I2C addresses
pub const I2C_ADDR_PRIMARY: u8 = 0x28;
pub const I2C_ADDR_SECONDARY: u8 = 0x29;

pub const BNO055_ID: u8 = 0xA0;

// Chip ID register
const CHIP_ID: u8 = 0x00;

// Data registers (X LSB first, 6 bytes per vector)
const ACC_DATA_X_LSB: u8 = 0x08;
const GYR_DATA_X_LSB: u8 = 0x14;

// Unit selection register
const UNIT_SEL: u8 = 0x3B;

// Mode registers
const OPR_MODE: u8 = 0x3D;
const PWR_MODE: u8 = 0x3E;
const SYS_TRIGGER: u8 = 0x3F;

// Axis sign register and values
const AXIS_MAP_SIGN: u8 = 0x42;
const AXIS_SIGN_POSITIVE: u8 = 0x00;
const AXIS_SIGN_NEGATIVE: u8 = 0x01;

// Sensor configuration registers
const ACC_CONFIG: u8 = 0x08;
const GYR_CONFIG_0: u8 = 0x0A;
const GYR_CONFIG_1: u8 = 0x0B;

// Accelerometer configuration: +/-2g, 7.81Hz bandwidth, normal power
const ACCEL_2G: u8 = 0x00;
const ACCEL_7_81HZ: u8 = 0x00;
const ACCEL_NORMAL: u8 = 0x00;

// Gyroscope configuration: +/-500dps, 32Hz bandwidth, normal power
const GYR_500DPS: u8 = 0x18;
const GYR_32HZ: u8 = 0x38;
const GYR_NORMAL: u8 = 0x00;

const NORMAL_POWER: u8 = 0x00;

// Scale factors from the data registers
const ACCEL_LSB_PER_MS2: f64 = 100.0;
const GYRO_LSB_PER_DPS: f64 = 16.0;

// Reset settle time; mode switches need more than 20ms
const RESET_SETTLE: Duration = Duration::from_millis(650);
const MODE_SETTLE: Duration = Duration::from_millis(30);

/// The closed set of operating modes the device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Register configuration only; no motion data is produced.
    Config,
    /// Raw accelerometer + gyroscope.
    AccGyro,
    /// Accelerometer + magnetometer + gyroscope.
    Amg,
    /// Full onboard fusion.
    Ndof,
}

impl OperatingMode {
    pub fn from_opcode(opcode: u8) -> Result<Self> {
        match opcode {
            0x00 => Ok(OperatingMode::Config),
            0x05 => Ok(OperatingMode::AccGyro),
            0x07 => Ok(OperatingMode::Amg),
            0x0C => Ok(OperatingMode::Ndof),
            other => Err(LoggerError::InvalidMode(other)),
        }
    }

    pub fn opcode(self) -> u8 {
        match self {
            OperatingMode::Config => 0x00,
            OperatingMode::AccGyro => 0x05,
            OperatingMode::Amg => 0x07,
            OperatingMode::Ndof => 0x0C,
        }
    }

    /// Whether the mode drives the accelerometer and gyroscope data registers.
    pub fn provides_motion_data(self) -> bool {
        !matches!(self, OperatingMode::Config)
    }
}

pub struct Bno055 {
    bus: SharedBus,
    address: u8,
    mode: OperatingMode,
}

impl Bno055 {
    /// Initialize the device: validate the chip identity, reset, then apply
    /// power, unit, axis-sign, and sensor range configuration.
    pub fn new(bus: SharedBus, address: u8, units: u8) -> Result<Self> {
        let mut imu = Self {
            bus,
            address,
            mode: OperatingMode::Config,
        };
        imu.set_mode(OperatingMode::Config)?;

        let chip_id = imu.read_register(CHIP_ID)?;
        if chip_id != BNO055_ID {
            return Err(LoggerError::IdentityMismatch {
                expected: BNO055_ID,
                found: chip_id,
            });
        }

        imu.reset()?;
        imu.write_register(PWR_MODE, NORMAL_POWER)?;
        imu.write_register(UNIT_SEL, units)?;
        imu.set_axis_sign(AXIS_SIGN_NEGATIVE, AXIS_SIGN_NEGATIVE, AXIS_SIGN_POSITIVE)?;
        imu.write_register(ACC_CONFIG, ACCEL_NORMAL + ACCEL_7_81HZ + ACCEL_2G)?;
        imu.write_register(GYR_CONFIG_0, GYR_32HZ + GYR_500DPS)?;
        imu.write_register(GYR_CONFIG_1, GYR_NORMAL)?;
        imu.set_mode(OperatingMode::Ndof)?;

        Ok(imu)
    }

    fn reset(&mut self) -> Result<()> {
        self.set_mode(OperatingMode::Config)?;
        // The chip drops off the bus mid-reset; the failed ack is expected.
        if let Err(e) = self.write_register(SYS_TRIGGER, 0x20) {
            log::debug!("reset write ended with {e} (chip resetting)");
        }
        std::thread::sleep(RESET_SETTLE);
        Ok(())
    }

    fn set_axis_sign(&mut self, x_sign: u8, y_sign: u8, z_sign: u8) -> Result<()> {
        let mut sign_config = 0x00;
        sign_config |= x_sign << 2;
        sign_config |= y_sign << 1;
        sign_config |= z_sign;
        self.write_register(AXIS_MAP_SIGN, sign_config)
    }

    /// Switch operating mode. The opcode set is closed; anything else is
    /// rejected before a register write happens.
    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<()> {
        self.write_register(OPR_MODE, mode.opcode())?;
        self.mode = mode;
        std::thread::sleep(MODE_SETTLE);
        Ok(())
    }

    /// Raw-opcode variant of [`set_mode`](Self::set_mode) for callers holding
    /// an untyped mode value.
    pub fn set_mode_opcode(&mut self, opcode: u8) -> Result<()> {
        self.set_mode(OperatingMode::from_opcode(opcode)?)
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Current accelerometer reading in m/s^2, or `None` outside
    /// motion-capable modes.
    pub fn acceleration(&mut self) -> Result<Option<[f64; 3]>> {
        if !self.mode.provides_motion_data() {
            return Ok(None);
        }
        let raw = self.read_vector(ACC_DATA_X_LSB)?;
        Ok(Some([
            raw[0] as f64 / ACCEL_LSB_PER_MS2,
            raw[1] as f64 / ACCEL_LSB_PER_MS2,
            raw[2] as f64 / ACCEL_LSB_PER_MS2,
        ]))
    }

    /// Current gyroscope reading in deg/s, or `None` outside motion-capable
    /// modes.
    pub fn gyroscope(&mut self) -> Result<Option<[f64; 3]>> {
        if !self.mode.provides_motion_data() {
            return Ok(None);
        }
        let raw = self.read_vector(GYR_DATA_X_LSB)?;
        Ok(Some([
            raw[0] as f64 / GYRO_LSB_PER_DPS,
            raw[1] as f64 / GYRO_LSB_PER_DPS,
            raw[2] as f64 / GYRO_LSB_PER_DPS,
        ]))
    }

    fn read_vector(&mut self, reg: u8) -> Result<[i16; 3]> {
        let mut data = [0u8; 6];
        lock_bus(&self.bus)?.read_block(self.address, reg, &mut data)?;
        let mut out = [0i16; 3];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = i16::from_le_bytes([data[i * 2], data[i * 2 + 1]]);
        }
        Ok(out)
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
        lock_bus(&self.bus)?.write_register(self.address, reg, value)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8> {
        lock_bus(&self.bus)?.read_register(self.address, reg)
    }
}

impl MotionSource for Bno055 {
    fn read_motion(&mut self) -> Result<MotionSample> {
        // One mode check gates both vectors, so a sample is either fully
        // populated or a null pair.
        if !self.mode.provides_motion_data() {
            return Ok(MotionSample::null());
        }
        let accel = self.acceleration()?;
        let gyro = self.gyroscope()?;
        match (accel, gyro) {
            (Some(a), Some(g)) => Ok(MotionSample::new(a, g)),
            _ => Ok(MotionSample::null()),
        }
    }
}
